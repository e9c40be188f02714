//! Perform trait と型消去
//!
//! `TypedHandler<J, P>` が `Perform<J>` を `JobHandler` に変換するので、
//! 型付きのジョブも名前ベースのレジストリにそのまま登録できる。

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use super::job::Job;
use crate::error::JobError;
use crate::runtime::JobHandler;

/// Runs a decoded `J`.
///
/// - `Perform<FetchTimeline>` は `FetchTimeline` しか受け取れない
#[async_trait]
pub trait Perform<J: Job>: Send + Sync {
    async fn perform(&self, job: J) -> Result<(), JobError>;
}

pub struct TypedHandler<J: Job, P: Perform<J>> {
    inner: P,
    _marker: PhantomData<fn() -> J>,
}

impl<J: Job, P: Perform<J>> TypedHandler<J, P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<J: Job, P: Perform<J>> JobHandler for TypedHandler<J, P> {
    async fn perform(&self, args: &[Value]) -> Result<(), JobError> {
        let [payload] = args else {
            return Err(JobError::InvalidArguments(format!(
                "{} expects exactly one argument, got {}",
                J::NAME,
                args.len()
            )));
        };
        let job: J = serde_json::from_value(payload.clone())
            .map_err(|e| JobError::InvalidArguments(format!("{}: json decode: {e}", J::NAME)))?;
        self.inner.perform(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::job::fixtures::FetchTimeline;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<FetchTimeline>>,
    }

    #[async_trait]
    impl Perform<FetchTimeline> for Recorder {
        async fn perform(&self, job: FetchTimeline) -> Result<(), JobError> {
            self.seen.lock().unwrap().push(job);
            Ok(())
        }
    }

    #[tokio::test]
    async fn decodes_first_arg_into_the_job() {
        let handler = TypedHandler::<FetchTimeline, _>::new(Recorder::default());

        handler
            .perform(&[json!({ "user_id": 42, "since": "2024-01-01" })])
            .await
            .unwrap();

        assert_eq!(
            handler.inner.seen.lock().unwrap().as_slice(),
            &[FetchTimeline {
                user_id: 42,
                since: Some("2024-01-01".to_string())
            }]
        );
    }

    #[tokio::test]
    async fn undecodable_args_are_invalid_arguments() {
        let handler = TypedHandler::<FetchTimeline, _>::new(Recorder::default());

        for args in [vec![], vec![json!("nope")], vec![json!({}), json!({})]] {
            let err = JobHandler::perform(&handler, &args).await.unwrap_err();
            assert!(matches!(err, JobError::InvalidArguments(_)));
        }
    }
}
