//! Reaper for AWS.

pub use aws_config::SdkConfig;
pub mod iam;

/// Loads the shared AWS config from the environment, overriding the region
/// when one was resolved.
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    let loader = match region {
        Some(region) => {
            log::debug!("using region {region}");
            loader.region(aws_config::Region::new(region.to_owned()))
        }
        None => loader,
    };
    loader.load().await
}
