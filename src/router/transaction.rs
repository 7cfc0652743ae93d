//! ConfigurationStarted / ConfigurationFinished bracket around mutations

use super::Router;
use crate::error::{Error, Result};
use crate::protocol::SoapResponse;
use crate::soap::{actions, Action, CODE_ALREADY_FINISHED};

/// Outcome of a mutation that the router accepted.
///
/// `warning` holds a ConfigurationFinished failure. The change itself was
/// applied; the router may just not have committed it yet.
#[derive(Debug)]
pub struct Commit {
    pub response: SoapResponse,
    pub warning: Option<Error>,
}

impl Commit {
    pub fn is_clean(&self) -> bool {
        self.warning.is_none()
    }
}

impl Router {
    /// Send a mutating action inside a configuration bracket
    pub async fn transaction(&mut self, action: &Action, body: &str) -> Result<Commit> {
        self.ensure_logged_in().await?;

        if self.session.config_started() {
            tracing::debug!("Finishing configuration left open by an earlier call");
            if let Err(e) = self.finish_configuration().await {
                tracing::debug!("Stale configuration could not be finished: {}", e);
            }
        }

        self.start_configuration().await?;

        let response = match self.protocol.send(&mut self.session, action, body).await {
            Ok(response) => response,
            Err(e) => {
                if self.session.config_started() {
                    if let Err(finish) = self.finish_configuration().await {
                        tracing::debug!("Finish after failed {} also failed: {}", action, finish);
                    }
                }
                return Err(e);
            }
        };

        let warning = self.finish_configuration().await.err();
        Ok(Commit { response, warning })
    }

    async fn start_configuration(&mut self) -> Result<()> {
        let body = actions::configuration_started(&self.session.session_id);
        self.protocol
            .send(&mut self.session, &actions::CONFIGURATION_STARTED, &body)
            .await?;
        self.session.set_config_started(true);
        Ok(())
    }

    /// 501 means the router already applied the changes and counts as done
    async fn finish_configuration(&mut self) -> Result<()> {
        let body = actions::configuration_finished();
        match self
            .protocol
            .send(&mut self.session, &actions::CONFIGURATION_FINISHED, &body)
            .await
        {
            Ok(_) => {
                self.session.set_config_started(false);
                Ok(())
            }
            Err(e) if e.response_code() == Some(CODE_ALREADY_FINISHED) => {
                tracing::debug!("Configuration was already finished");
                self.session.set_config_started(false);
                Ok(())
            }
            Err(e) => {
                self.session.set_config_started(true);
                tracing::warn!("ConfigurationFinished failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{code, FakeTransport};
    use crate::router::tests::logged_in;

    #[tokio::test]
    async fn test_finish_501_is_success() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push("ConfigurationStarted", code("000"));
        fake.push("Reboot", code("000"));
        fake.push("ConfigurationFinished", code("501"));

        let commit = router.transaction(&actions::REBOOT, "").await.unwrap();
        assert!(commit.is_clean());
        assert!(!router.session().config_started());
    }

    #[tokio::test]
    async fn test_finish_500_keeps_mutation_and_warns() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push("ConfigurationStarted", code("000"));
        fake.push("Reboot", code("000"));
        fake.push("ConfigurationFinished", code("500"));

        let commit = router.transaction(&actions::REBOOT, "").await.unwrap();
        assert_eq!(commit.response.response_code, 0);
        assert_eq!(commit.warning.as_ref().and_then(|w| w.response_code()), Some(500));
        assert!(router.session().config_started());
        assert!(router.logged_in());
    }

    #[tokio::test]
    async fn test_failed_start_skips_mutation() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push("ConfigurationStarted", code("002"));

        assert!(router.transaction(&actions::REBOOT, "").await.is_err());
        assert!(!fake.calls().contains(&"Reboot".to_string()));
        assert!(!router.session().config_started());
    }

    #[tokio::test]
    async fn test_open_configuration_is_finished_first() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push("ConfigurationStarted", code("000"));
        fake.push("Reboot", code("000"));
        fake.push("ConfigurationFinished", code("500"));
        router.transaction(&actions::REBOOT, "").await.unwrap();

        fake.push("ConfigurationFinished", code("000"));
        fake.push("ConfigurationStarted", code("000"));
        fake.push("EnableTrafficMeter", code("000"));
        fake.push("ConfigurationFinished", code("000"));
        let commit = router
            .transaction(
                &actions::ENABLE_TRAFFIC_METER,
                &actions::toggle(&actions::ENABLE_TRAFFIC_METER, "NewTrafficMeterEnable", true),
            )
            .await
            .unwrap();
        assert!(commit.is_clean());
        assert!(!router.session().config_started());
        assert_eq!(
            &fake.calls()[4..],
            &[
                "ConfigurationFinished",
                "ConfigurationStarted",
                "EnableTrafficMeter",
                "ConfigurationFinished"
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_mutation_still_closes_bracket() {
        let fake = FakeTransport::new();
        let mut router = logged_in(&fake).await;
        fake.push("ConfigurationStarted", code("000"));
        fake.push("SetQoSEnableStatus", code("003"));
        fake.push("ConfigurationFinished", code("000"));

        let err = router
            .transaction(&actions::SET_QOS_ENABLE_STATUS, "")
            .await
            .unwrap_err();
        assert_eq!(err.response_code(), Some(3));
        assert!(!router.session().config_started());
        assert_eq!(fake.calls().last().map(String::as_str), Some("ConfigurationFinished"));
    }
}
