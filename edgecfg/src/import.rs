//! Import flow: rebuild request bodies from records and submit them.
//!
//! Each service is submitted on its own. A failure in one is logged and
//! reported but never stops the others, except a rejected session, which
//! aborts the run. In poll mode a service counts as
//! applied only once the device stops reporting busy; exhausting the poll
//! window is reported as a timeout, which is a warning rather than a failure.

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::{EdgeApi, EdgeRef};
use crate::error::EdgeError;
use crate::model::{EdgeRecords, Service};
use crate::poll::{wait_until_idle, PollSettings};
use crate::profile::SubmitMode;
use crate::schema::ConfigSchema;

/// Result of one service submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServiceStatus {
    Applied,
    Failed { reason: String },
    TimedOut { attempts: u32 },
    /// No records file was present for the service.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceOutcome {
    pub service: Service,
    /// Records carried by the request body.
    pub records: usize,
    #[serde(flatten)]
    pub status: ServiceStatus,
}

/// Per-service outcomes of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub source: String,
    pub target: String,
    pub outcomes: Vec<ServiceOutcome>,
}

impl ImportReport {
    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o.status, ServiceStatus::Failed { .. }))
    }

    pub fn outcome(&self, service: Service) -> Option<&ServiceOutcome> {
        self.outcomes.iter().find(|o| o.service == service)
    }
}

/// Submits record sets to one target through an [`EdgeApi`].
pub struct Importer<'a, A: EdgeApi + ?Sized> {
    api: &'a A,
    schema: &'a dyn ConfigSchema,
    mode: SubmitMode,
    poll: PollSettings,
    sleep: fn(Duration),
}

impl<'a, A: EdgeApi + ?Sized> Importer<'a, A> {
    pub fn new(
        api: &'a A,
        schema: &'a dyn ConfigSchema,
        mode: SubmitMode,
        poll: PollSettings,
    ) -> Self {
        Self {
            api,
            schema,
            mode,
            poll,
            sleep: std::thread::sleep,
        }
    }

    /// Replace the poll sleep, e.g. to run without delays.
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    /// Submit every requested service in [`Service::ALL`] order.
    ///
    /// `available` lists the services that had a records file; the others are
    /// reported as skipped. A fatal error ([`EdgeError::is_fatal`]) stops the
    /// run before any further service is attempted.
    pub fn run(
        &self,
        source: &str,
        target: &EdgeRef,
        records: &EdgeRecords,
        available: &[Service],
        services: &[Service],
    ) -> Result<ImportReport, EdgeError> {
        let mut report = ImportReport {
            source: source.to_string(),
            target: target.name.clone(),
            outcomes: Vec::new(),
        };

        for service in Service::ALL {
            if !services.contains(&service) {
                continue;
            }
            let count = self.record_count(records, service);
            let status = if available.contains(&service) {
                self.apply(target, service, records)?
            } else {
                info!(%service, "no records file; skipping");
                ServiceStatus::Skipped
            };
            report.outcomes.push(ServiceOutcome {
                service,
                records: count,
                status,
            });
        }
        Ok(report)
    }

    fn apply(
        &self,
        target: &EdgeRef,
        service: Service,
        records: &EdgeRecords,
    ) -> Result<ServiceStatus, EdgeError> {
        let body = self.schema.build_request(service, records);
        info!(
            %service,
            edge = %target.name,
            schema = %self.schema.version(),
            "submitting {} records",
            self.record_count(records, service)
        );

        if let Err(err) = self.api.submit(target, service, &body) {
            if err.is_fatal() {
                error!(%service, edge = %target.name, "aborting import: {err}");
                return Err(err);
            }
            error!(%service, edge = %target.name, "{err}");
            return Ok(ServiceStatus::Failed {
                reason: err.to_string(),
            });
        }

        if self.mode == SubmitMode::SingleShot {
            return Ok(ServiceStatus::Applied);
        }

        let is_busy = || self.api.is_busy(target);
        let status = match wait_until_idle(service, &self.poll, is_busy, self.sleep) {
            Ok(attempts) => {
                info!(%service, attempts, "change applied");
                ServiceStatus::Applied
            }
            Err(EdgeError::ScheduleTimeout { attempts, .. }) => {
                warn!(
                    %service,
                    edge = %target.name,
                    "change still in progress after {attempts} status checks; not waiting further"
                );
                ServiceStatus::TimedOut { attempts }
            }
            Err(err) if err.is_fatal() => {
                error!(%service, edge = %target.name, "aborting import: {err}");
                return Err(err);
            }
            Err(err) => {
                error!(%service, edge = %target.name, "poll after {service} submit failed: {err}");
                ServiceStatus::Failed {
                    reason: format!("poll: {err}"),
                }
            }
        };
        Ok(status)
    }

    /// Records the request body for `service` actually carries.
    fn record_count(&self, records: &EdgeRecords, service: Service) -> usize {
        match service {
            Service::Nat => records.nat_rules.len(),
            Service::Firewall => records.firewall_rules.len(),
            Service::Routing => {
                let default_route = records.default_route.is_some()
                    && self.schema.supports_default_route();
                records.static_routes.len() + usize::from(default_route)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use edge_xml::XmlNode;

    use super::{ImportReport, Importer, ServiceStatus};
    use crate::api::{EdgeApi, EdgeRef};
    use crate::error::{EdgeError, Stage};
    use crate::model::{
        DefaultRoute, EdgeRecords, FirewallPolicy, FirewallRule, NatAction, NatRule, Service,
        StaticRoute,
    };
    use crate::poll::PollSettings;
    use crate::profile::SubmitMode;
    use crate::schema::{schema_for, SchemaVersion};

    struct FakeApi {
        fail: Option<Service>,
        busy: bool,
        session_rejected: bool,
        submitted: RefCell<Vec<(Service, String)>>,
        busy_queries: Cell<u32>,
    }

    impl FakeApi {
        fn new(fail: Option<Service>, busy: bool) -> Self {
            Self {
                fail,
                busy,
                session_rejected: false,
                submitted: RefCell::new(Vec::new()),
                busy_queries: Cell::new(0),
            }
        }
    }

    impl EdgeApi for FakeApi {
        fn find_edge(&self, name: &str) -> Result<EdgeRef, EdgeError> {
            Ok(EdgeRef::named(name))
        }

        fn fetch_config(&self, _edge: &EdgeRef) -> Result<XmlNode, EdgeError> {
            Err(EdgeError::Unsupported("fetch"))
        }

        fn submit(
            &self,
            _edge: &EdgeRef,
            service: Service,
            body: &XmlNode,
        ) -> Result<(), EdgeError> {
            self.submitted
                .borrow_mut()
                .push((service, body.tag.clone()));
            if self.session_rejected {
                return Err(EdgeError::Auth {
                    stage: Stage::Submit(service),
                    reason: "HTTP 401 Unauthorized".to_string(),
                });
            }
            if self.fail == Some(service) {
                return Err(EdgeError::Status {
                    stage: Stage::Submit(service),
                    url: "https://vcd.example/rules".to_string(),
                    status: 400,
                    body: "invalid rule".to_string(),
                });
            }
            Ok(())
        }

        fn is_busy(&self, _edge: &EdgeRef) -> Result<bool, EdgeError> {
            self.busy_queries.set(self.busy_queries.get() + 1);
            Ok(self.busy)
        }
    }

    fn records() -> EdgeRecords {
        EdgeRecords {
            nat_rules: vec![NatRule {
                rule_id: "196609".to_string(),
                action: NatAction::Dnat,
                interface_id: "0".to_string(),
                interface_name: None,
                interface_href: None,
                original_address: "203.0.113.10".to_string(),
                original_port: "443".to_string(),
                translated_address: "10.0.0.10".to_string(),
                translated_port: "8443".to_string(),
                protocol: "tcp".to_string(),
                enabled: true,
                logging: false,
                description: Some("web".to_string()),
            }],
            firewall_rules: vec![FirewallRule {
                rule_id: "131074".to_string(),
                enabled: true,
                description: Some("allow web".to_string()),
                source: "any".to_string(),
                destination: "10.0.0.10".to_string(),
                service: "tcp:443:any".to_string(),
                logging: false,
                policy: FirewallPolicy::Allow,
            }],
            static_routes: vec![StaticRoute {
                description: None,
                interface: "0".to_string(),
                network: "192.168.50.0/24".to_string(),
                next_hop: "10.0.0.254".to_string(),
                admin_distance: Some(1),
                mtu: 1500,
            }],
            default_route: None,
        }
    }

    fn run(api: &FakeApi, version: SchemaVersion, mode: SubmitMode) -> ImportReport {
        Importer::new(api, schema_for(version), mode, PollSettings::default())
            .with_sleep(|_| {})
            .run(
                "edge-01",
                &EdgeRef::named("edge-02"),
                &records(),
                &Service::ALL,
                &Service::ALL,
            )
            .expect("import run")
    }

    #[test]
    fn firewall_failure_does_not_stop_other_services() {
        let api = FakeApi::new(Some(Service::Firewall), false);
        let report = run(&api, SchemaVersion::V1, SubmitMode::SingleShot);

        let submitted: Vec<Service> = api.submitted.borrow().iter().map(|(s, _)| *s).collect();
        assert_eq!(submitted, Service::ALL.to_vec());
        assert_eq!(
            report.outcome(Service::Nat).map(|o| &o.status),
            Some(&ServiceStatus::Applied)
        );
        assert!(matches!(
            report.outcome(Service::Firewall).map(|o| &o.status),
            Some(ServiceStatus::Failed { .. })
        ));
        assert_eq!(
            report.outcome(Service::Routing).map(|o| &o.status),
            Some(&ServiceStatus::Applied)
        );
        assert!(report.has_failures());
        assert_eq!(api.busy_queries.get(), 0);
    }

    #[test]
    fn always_busy_device_times_out_without_failing() {
        let api = FakeApi::new(None, true);
        let report = run(&api, SchemaVersion::V2, SubmitMode::Poll);

        assert_eq!(api.busy_queries.get(), 3 * 120);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.status == ServiceStatus::TimedOut { attempts: 120 }));
        assert!(!report.has_failures());
    }

    #[test]
    fn poll_mode_applies_once_idle() {
        let api = FakeApi::new(None, false);
        let report = run(&api, SchemaVersion::V2, SubmitMode::Poll);

        assert_eq!(api.busy_queries.get(), 3);
        let tags: Vec<String> = api.submitted.borrow().iter().map(|(_, t)| t.clone()).collect();
        assert!(tags.iter().all(|t| t == "EdgeGatewayServiceConfiguration"));
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.status == ServiceStatus::Applied));
    }

    #[test]
    fn missing_files_and_unselected_services_are_skipped() {
        let api = FakeApi::new(None, false);
        let report = Importer::new(
            &api,
            schema_for(SchemaVersion::V1),
            SubmitMode::SingleShot,
            PollSettings::default(),
        )
        .run(
            "edge-01",
            &EdgeRef::named("edge-02"),
            &records(),
            &[Service::Nat],
            &[Service::Nat, Service::Routing],
        )
        .expect("import run");

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].status, ServiceStatus::Applied);
        assert_eq!(report.outcomes[1].service, Service::Routing);
        assert_eq!(report.outcomes[1].status, ServiceStatus::Skipped);
        assert_eq!(api.submitted.borrow().len(), 1);
    }

    #[test]
    fn rejected_session_aborts_remaining_services() {
        let mut api = FakeApi::new(None, false);
        api.session_rejected = true;

        let result = Importer::new(
            &api,
            schema_for(SchemaVersion::V1),
            SubmitMode::SingleShot,
            PollSettings::default(),
        )
        .run(
            "edge-01",
            &EdgeRef::named("edge-02"),
            &records(),
            &Service::ALL,
            &Service::ALL,
        );

        assert!(matches!(result, Err(EdgeError::Auth { .. })));
        let submitted: Vec<Service> = api.submitted.borrow().iter().map(|(s, _)| *s).collect();
        assert_eq!(submitted, vec![Service::Nat]);
    }

    #[test]
    fn v2_routing_count_leaves_out_default_route() {
        let mut with_default = records();
        with_default.default_route = Some(DefaultRoute {
            interface: "0".to_string(),
            gateway_address: "203.0.113.254".to_string(),
            admin_distance: None,
            mtu: 1500,
        });

        let count_for = |version| {
            let api = FakeApi::new(None, false);
            Importer::new(
                &api,
                schema_for(version),
                SubmitMode::SingleShot,
                PollSettings::default(),
            )
            .run(
                "edge-01",
                &EdgeRef::named("edge-02"),
                &with_default,
                &Service::ALL,
                &[Service::Routing],
            )
            .expect("import run")
            .outcomes[0]
                .records
        };

        assert_eq!(count_for(SchemaVersion::V1), 2);
        assert_eq!(count_for(SchemaVersion::V2), 1);
    }
}
