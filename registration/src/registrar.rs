use crate::background::{BackgroundQueue, BackgroundWorker};
use crate::config::{BatchPolicy, Config};
use crate::contacts::ContactResolver;
use crate::errors::{ApiError, RegistrationError};
use crate::orchestrator::{BatchOrchestrator, BatchOutcome};
use crate::planner;
use crate::remote::{MarketingApi, RemoteClient};
use crate::types::{RegistrationRequest, RegistrationResult};
use serde_json::{Map, json};
use shared::admin_service::ServiceStatus;
use std::sync::Arc;

/// Entry point for a registration: contact, then segments.
#[derive(Clone)]
pub struct Registrar {
    api: Arc<dyn MarketingApi>,
    contacts: ContactResolver,
    orchestrator: BatchOrchestrator,
    background: BackgroundQueue,
}

impl Registrar {
    /// Wires the pipeline on top of `api` and starts the background worker.
    pub fn new(api: Arc<dyn MarketingApi>, policy: BatchPolicy) -> (Self, BackgroundWorker) {
        let (background, worker) = BackgroundQueue::start(api.clone(), &policy);
        let registrar = Registrar {
            contacts: ContactResolver::new(api.clone()),
            orchestrator: BatchOrchestrator::new(api.clone(), policy, background.clone()),
            api,
            background,
        };
        (registrar, worker)
    }

    pub fn from_config(config: &Config) -> Result<(Self, BackgroundWorker), ApiError> {
        let client = RemoteClient::new(&config.remote, config.retry.clone())?;
        Ok(Self::new(Arc::new(client), config.batch.clone()))
    }

    /// Registers the contact and assigns its segments.
    ///
    /// Only configuration and contact failures are errors. Segment failures
    /// show up as a lower `segments_resolved`.
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationResult, RegistrationError> {
        self.api.ensure_configured()?;

        tracing::info!(email = %request.email, "registration started");

        let contact_id = self.contacts.resolve(&request.name, &request.email).await?;
        let plan = planner::plan(&request);
        let segments_total = plan.len();

        let outcome = self.orchestrator.process(plan, &contact_id).await;
        let message = compose_message(&outcome, segments_total);

        tracing::info!(
            email = %request.email,
            contact_id = %contact_id,
            resolved = outcome.resolved_immediate.len(),
            total = segments_total,
            background = outcome.background_scheduled,
            "registration finished"
        );

        Ok(RegistrationResult {
            success: true,
            contact_id,
            segments_resolved: outcome.resolved_immediate.len(),
            segments_total,
            background_pending: outcome.background_scheduled,
            message,
        })
    }

    pub fn status(&self) -> ServiceStatus {
        let configured = self.api.ensure_configured().is_ok();

        let mut details = Map::new();
        details.insert("credentialConfigured".into(), json!(configured));
        details.insert(
            "backgroundJobsPending".into(),
            json!(self.background.pending()),
        );

        ServiceStatus {
            ready: configured,
            details,
        }
    }
}

fn compose_message(outcome: &BatchOutcome, total: usize) -> String {
    const DONE: &str = "Cadastro realizado com sucesso!";

    if total == 0 {
        return DONE.to_string();
    }

    let resolved = outcome.resolved_immediate.len();
    if outcome.background_scheduled {
        format!(
            "{DONE} {resolved} de {total} segmentações aplicadas; as demais serão processadas em segundo plano."
        )
    } else {
        format!("{DONE} {resolved} de {total} segmentações aplicadas.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{Call, FakeMarketingApi};
    use crate::types::ContactId;
    use std::collections::HashSet;

    fn policy() -> BatchPolicy {
        BatchPolicy {
            immediate_cap: 6,
            immediate_delay_ms: 1_000,
            background_delay_ms: 2_000,
            background_queue_capacity: 8,
        }
    }

    fn ana() -> RegistrationRequest {
        RegistrationRequest {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            profiles: vec!["estudante".into()],
            interests: vec!["saude".into()],
            institutional_info_requested: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_ana() {
        let api = Arc::new(FakeMarketingApi::new());
        let (registrar, worker) = Registrar::new(api.clone(), policy());

        let result = registrar.register(ana()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.segments_resolved, 3);
        assert_eq!(result.segments_total, 3);
        assert!(!result.background_pending);
        assert_eq!(
            result.message,
            "Cadastro realizado com sucesso! 3 de 3 segmentações aplicadas."
        );

        let searched: Vec<Call> = api
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::SearchSegment(_)))
            .collect();
        assert_eq!(
            searched,
            vec![
                Call::SearchSegment("Estudantes".into()),
                Call::SearchSegment("Interesse: Saúde".into()),
                Call::SearchSegment("Informações Institucionais Neurônio".into()),
            ]
        );

        worker.drain().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_with_background_remainder() {
        let api = Arc::new(FakeMarketingApi::new());
        let (registrar, worker) = Registrar::new(api.clone(), policy());

        let request = RegistrationRequest {
            profiles: vec![
                "setor-publico".into(),
                "setor-privado".into(),
                "setor-social".into(),
                "empreendedor".into(),
                "consultor".into(),
                "estudante".into(),
            ],
            interests: vec!["saude".into(), "inovacao".into()],
            institutional_info_requested: true,
            ..ana()
        };

        let result = registrar.register(request).await.unwrap();

        assert_eq!(result.segments_total, 9);
        assert!(result.segments_resolved <= 6);
        assert!(result.background_pending);
        assert!(result.message.contains("segundo plano"));
        assert_eq!(registrar.background.pending(), 1);

        worker.drain().await;
        assert_eq!(registrar.background.pending(), 0);
        assert_eq!(api.count(|c| matches!(c, Call::CreateSegment(_))), 9);
    }

    #[tokio::test]
    async fn test_missing_credential_makes_no_calls() {
        let api = Arc::new(FakeMarketingApi {
            unconfigured: true,
            ..FakeMarketingApi::new()
        });
        let (registrar, _worker) = Registrar::new(api.clone(), policy());

        let err = registrar.register(ana()).await.unwrap_err();

        assert!(matches!(err, RegistrationError::Configuration));
        assert!(api.calls().is_empty());
        assert!(!registrar.status().ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_segment_failures_still_succeed() {
        let api = Arc::new(FakeMarketingApi {
            failing_segment_creates: HashSet::from(["Interesse: Saúde".to_string()]),
            fail_subscribe: true,
            ..FakeMarketingApi::new()
        });
        let (registrar, _worker) = Registrar::new(api, policy());

        let result = registrar.register(ana()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.segments_resolved, 2);
        assert_eq!(result.segments_total, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_contact_is_not_an_error() {
        let api = Arc::new(FakeMarketingApi::new().with_racing_contact("ana@example.com"));
        let (registrar, _worker) = Registrar::new(api.clone(), policy());

        let result = registrar.register(ana()).await.unwrap();

        assert_eq!(result.contact_id, ContactId::new("c1"));
        assert_eq!(
            api.count(|c| matches!(c, Call::SearchContact(_))),
            2
        );
    }

    #[tokio::test]
    async fn test_contact_failure_is_fatal() {
        let api = Arc::new(FakeMarketingApi {
            contact_create_error: Some(|| ApiError::RateLimitExceeded { attempts: 3 }),
            ..FakeMarketingApi::new()
        });
        let (registrar, _worker) = Registrar::new(api.clone(), policy());

        let err = registrar.register(ana()).await.unwrap_err();

        assert_eq!(err.category(), "rate_limit");
        assert_eq!(api.count(|c| matches!(c, Call::SearchSegment(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_selections() {
        let api = Arc::new(FakeMarketingApi::new());
        let (registrar, _worker) = Registrar::new(api.clone(), policy());

        let request = RegistrationRequest {
            profiles: vec![],
            interests: vec![],
            institutional_info_requested: false,
            ..ana()
        };
        let result = registrar.register(request).await.unwrap();

        assert_eq!(result.segments_total, 0);
        assert_eq!(result.message, "Cadastro realizado com sucesso!");
        assert!(api.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_status_reports_queue_and_credential() {
        let api = Arc::new(FakeMarketingApi::new());
        let (registrar, _worker) = Registrar::new(api, policy());

        let status = registrar.status();
        assert!(status.ready);
        assert_eq!(status.details["credentialConfigured"], json!(true));
        assert_eq!(status.details["backgroundJobsPending"], json!(0));
    }
}
