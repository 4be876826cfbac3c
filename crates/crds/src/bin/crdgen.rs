//! Prints the ClusterIngress CRD manifest as YAML.

use crds::ClusterIngress;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&ClusterIngress::crd())?);
    Ok(())
}
