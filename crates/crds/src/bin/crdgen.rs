//! Prints the CRD manifests as a multi-document YAML stream
//!
//! ```text
//! cargo run -p crds --bin crdgen > config/crd/service-exposure.yaml
//! ```

use crds::ServiceExposure;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let crds = [ServiceExposure::crd()];
    for crd in &crds {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
