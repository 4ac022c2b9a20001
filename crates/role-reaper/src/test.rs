use std::{
    collections::HashSet,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use pretty_assertions::assert_eq;

use crate::*;

#[derive(Clone, Debug, PartialEq)]
enum Call {
    List,
    DeletePolicy { role: String, policy: String },
    DeleteRole(String),
}

/// An in-memory account that journals every call made against it.
#[derive(Default)]
struct FakeAccount {
    roles: Mutex<Vec<String>>,
    calls: Mutex<Vec<Call>>,
    fail_list: bool,
    fail_policy: HashSet<String>,
    fail_delete: HashSet<String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeAccount {
    fn with_roles(names: &[&str]) -> Self {
        FakeAccount {
            roles: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| *c != Call::List)
            .collect()
    }

    fn remaining(&self) -> Vec<String> {
        self.roles.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn busy(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RoleProvider for FakeAccount {
    type Error = String;

    async fn list_roles(&self) -> Result<Vec<Role>, String> {
        self.record(Call::List);
        if self.fail_list {
            return Err("Throttling: rate exceeded".to_owned());
        }
        Ok(self.remaining().into_iter().map(Role::new).collect())
    }

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> Result<(), String> {
        self.busy().await;
        self.record(Call::DeletePolicy {
            role: role_name.to_owned(),
            policy: policy_name.to_owned(),
        });
        if self.fail_policy.contains(role_name) {
            return Err(format!("NoSuchEntity: policy {policy_name} not found"));
        }
        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> Result<(), String> {
        self.busy().await;
        self.record(Call::DeleteRole(role_name.to_owned()));
        if self.fail_delete.contains(role_name) {
            return Err("DeleteConflict: role has instance profiles".to_owned());
        }
        self.roles.lock().unwrap().retain(|r| r != role_name);
        Ok(())
    }
}

fn naming() -> NamingContext {
    NamingContext::new("svc", "stage")
}

fn names(roles: &[Role]) -> Vec<&str> {
    roles.iter().map(|r| r.name.as_str()).collect()
}

#[tokio::test]
async fn selects_roles_by_prefix() {
    let _ = env_logger::builder().is_test(true).try_init();

    let account = FakeAccount::with_roles(&["svc-stage-A", "other-C", "svc-stage-B"]);
    let reaper = Reaper::new(&account, naming());
    let roles = reaper.list().await.unwrap();
    assert_eq!(vec!["svc-stage-A", "svc-stage-B"], names(&roles));
}

#[tokio::test]
async fn detaches_before_deleting() {
    let _ = env_logger::builder().is_test(true).try_init();

    let account = FakeAccount::with_roles(&["svc-stage-A", "svc-stage-B", "other-C"]);
    let report = Reaper::new(&account, naming())
        .with_apply(true)
        .run()
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(
        vec!["svc-stage-A", "svc-stage-B"],
        report.removed().map(|r| r.name.as_str()).collect::<Vec<_>>()
    );

    let calls = account.calls();
    for role in ["svc-stage-A", "svc-stage-B"] {
        let detach = calls
            .iter()
            .position(|c| {
                *c == Call::DeletePolicy {
                    role: role.to_owned(),
                    policy: "stage-svc-lambda".to_owned(),
                }
            })
            .unwrap();
        let delete = calls
            .iter()
            .position(|c| *c == Call::DeleteRole(role.to_owned()))
            .unwrap();
        assert!(detach < delete, "{role} deleted before its policy: {calls:#?}");
    }
    assert_eq!(vec!["other-C".to_owned()], account.remaining());
}

#[tokio::test]
async fn failed_detach_does_not_stop_siblings() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut account = FakeAccount::with_roles(&["svc-stage-A", "svc-stage-B"]);
    account.fail_policy.insert("svc-stage-A".to_owned());
    let report = Reaper::new(&account, naming())
        .with_apply(true)
        .run()
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(
        vec!["svc-stage-B"],
        report.removed().map(|r| r.name.as_str()).collect::<Vec<_>>()
    );
    let failures = report.failures().collect::<Vec<_>>();
    assert_eq!(1, failures.len());
    assert_eq!("svc-stage-A", failures[0].0.name);
    assert!(matches!(failures[0].1, Error::DetachPolicy { .. }));

    // A failed detach means the role itself is never touched.
    assert!(!account
        .calls()
        .contains(&Call::DeleteRole("svc-stage-A".to_owned())));
    assert_eq!(vec!["svc-stage-A".to_owned()], account.remaining());
}

#[tokio::test]
async fn failed_delete_is_reported() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut account = FakeAccount::with_roles(&["svc-stage-A", "svc-stage-B"]);
    account.fail_delete.insert("svc-stage-B".to_owned());
    let report = Reaper::new(&account, naming())
        .with_apply(true)
        .run()
        .await
        .unwrap();

    let failures = report.failures().collect::<Vec<_>>();
    assert_eq!(1, failures.len());
    assert!(matches!(
        failures[0].1,
        Error::DeleteRole { role, .. } if role == "svc-stage-B"
    ));

    match report.into_result() {
        Err(Error::PartialFailure { failed, attempted }) => {
            assert_eq!((1, 2), (failed, attempted));
        }
        other => panic!("expected a partial failure, got {other:?}"),
    }
}

#[tokio::test]
async fn enumeration_failure_is_fatal() {
    let _ = env_logger::builder().is_test(true).try_init();

    let account = FakeAccount {
        fail_list: true,
        ..FakeAccount::with_roles(&["svc-stage-A", "svc-stage-B"])
    };
    let result = Reaper::new(&account, naming()).with_apply(true).run().await;
    match result {
        Err(e @ Error::Enumeration { .. }) => {
            assert_eq!(
                "Could not enumerate roles: Throttling: rate exceeded",
                e.to_string()
            );
        }
        other => panic!("expected an enumeration error, got {other:?}"),
    }
    assert_eq!(vec![Call::List], account.calls());
}

#[tokio::test]
async fn nothing_to_do_is_a_success() {
    let _ = env_logger::builder().is_test(true).try_init();

    let account = FakeAccount::with_roles(&["other-C"]);
    let report = Reaper::new(&account, naming())
        .with_apply(true)
        .run()
        .await
        .unwrap();
    assert_eq!(0, report.attempted());
    assert!(report.is_success());
    assert!(account.mutations().is_empty());
    assert_eq!("No roles match prefix 'svc-stage'.\n", report.to_string());
    assert!(report.into_result().is_ok());
}

#[tokio::test]
async fn rerunning_is_idempotent() {
    let _ = env_logger::builder().is_test(true).try_init();

    let account = FakeAccount::with_roles(&["svc-stage-A", "other-C"]);
    let reaper = Reaper::new(&account, naming()).with_apply(true);
    let first = reaper.run().await.unwrap();
    assert_eq!(1, first.removed().count());

    for _ in 0..2 {
        let report = reaper.run().await.unwrap();
        assert_eq!(0, report.attempted());
        assert!(report.is_success());
    }
    assert_eq!(2, account.mutations().len());
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let _ = env_logger::builder().is_test(true).try_init();

    let roles = (0..6).map(|i| format!("svc-stage-{i}")).collect::<Vec<_>>();
    let account = FakeAccount::with_roles(&roles.iter().map(String::as_str).collect::<Vec<_>>());
    let report = Reaper::new(&account, naming())
        .with_apply(true)
        .with_concurrency(NonZeroUsize::new(2).unwrap())
        .run()
        .await
        .unwrap();

    assert_eq!(6, report.removed().count());
    assert_eq!(2, account.max_in_flight.load(Ordering::SeqCst));
    // Outcomes keep enumeration order regardless of completion order.
    assert_eq!(
        roles,
        report
            .outcomes
            .iter()
            .map(|o| o.role.name.clone())
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn dry_run_touches_nothing() {
    let _ = env_logger::builder().is_test(true).try_init();

    let account = FakeAccount::with_roles(&["svc-stage-A", "svc-stage-B", "other-C"]);
    let report = Reaper::new(&account, naming()).run().await.unwrap();

    assert!(account.mutations().is_empty());
    assert_eq!(2, report.planned().count());
    assert!(report.is_success());
    assert_eq!(
        "  remove 'svc-stage-A'\n  remove 'svc-stage-B'\n",
        report.to_string()
    );
}

#[tokio::test]
async fn custom_prefix_and_policy_name() {
    let _ = env_logger::builder().is_test(true).try_init();

    let account = FakeAccount::with_roles(&["gateway-x-role", "svc-stage-A"]);
    let naming = NamingContext {
        prefix: "gateway".to_owned(),
        ..NamingContext::new("buyte", "prod")
    };
    let report = Reaper::new(&account, naming)
        .with_apply(true)
        .run()
        .await
        .unwrap();

    assert_eq!(1, report.removed().count());
    assert_eq!(
        vec![
            Call::DeletePolicy {
                role: "gateway-x-role".to_owned(),
                policy: "prod-buyte-lambda".to_owned(),
            },
            Call::DeleteRole("gateway-x-role".to_owned()),
        ],
        account.mutations()
    );
}
