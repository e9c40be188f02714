//! Job trait - handler 名と引数の型を対応付ける
//!
//! # Trait Bounds
//! - `Serialize` / `DeserializeOwned`: エンベロープの `args[0]` との相互変換
//! - `Send + Sync + 'static`: Arc に格納して worker 間で共有するため

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CooldownError;
use crate::ports::StoreError;

/// A job whose single argument is `Self`.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct FetchTimeline {
///     user_id: u64,
/// }
///
/// impl Job for FetchTimeline {
///     const NAME: &'static str = "Acme::Jobs::FetchTimeline";
/// }
/// ```
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Handler name; `::`-qualified names nest in the registry.
    const NAME: &'static str;

    /// Envelope args for this job.
    fn to_args(&self) -> Result<Vec<Value>, CooldownError> {
        let value = serde_json::to_value(self)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", Self::NAME)))?;
        Ok(vec![value])
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde::{Deserialize, Serialize};

    use super::Job;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct FetchTimeline {
        pub user_id: u64,
        pub since: Option<String>,
    }

    impl Job for FetchTimeline {
        const NAME: &'static str = "Acme::Jobs::FetchTimeline";
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::FetchTimeline;
    use super::*;
    use serde_json::json;

    #[test]
    fn to_args_is_a_single_json_value() {
        let job = FetchTimeline {
            user_id: 7,
            since: None,
        };
        assert_eq!(
            job.to_args().unwrap(),
            vec![json!({ "user_id": 7, "since": null })]
        );
    }
}
