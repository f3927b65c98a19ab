//! Print the `ClusterScan` CustomResourceDefinition as YAML.
//!
//! `cargo run --bin crdgen > charts/scan-controller/crds/clusterscan.yaml`

use kube::CustomResourceExt;
use scan_controller::ClusterScan;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&ClusterScan::crd())?);
    Ok(())
}
