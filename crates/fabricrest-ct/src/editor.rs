//! Ordered rule-list editor: locked, position-aware read-modify-write
//! mutation of a policy's server-resident rule list.
//!
//! The controller assigns rule identities during the write and does not
//! return them, so inserts finish with a bounded, linearly backed-off
//! re-fetch that scans for the new rule's label — absorbing the server's
//! eventual-consistency lag.
//!
//! The advisory lock serializes callers within this process only. A second
//! client instance mutating the same remote policy is last-write-wins at
//! the server.

use std::sync::Arc;

use tokio::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use fabricrest_core::{ApiError, ApiExecutor, LinearRetry, LockRegistry, ObjectId, RetryConfig};

use crate::error::CtError;
use crate::rule::{RawRule, Rule};

/// Wire shape of a fetched security policy. Fields this crate does not
/// touch are carried in `extra` so a write-back never drops them.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPolicy {
    id: ObjectId,
    label: String,
    rules: Vec<RawRule>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Compute where to splice a new rule into a list of `len` rules.
///
/// All four branches are explicit: negative positions and positions past
/// the end both append, zero prepends, anything else inserts before that
/// index.
fn splice_index(position: i64, len: usize) -> usize {
    if position < 0 {
        len
    } else if position == 0 {
        0
    } else if (position as usize) < len {
        position as usize
    } else {
        len
    }
}

/// Editor for one blueprint's security-policy rule lists.
pub struct PolicyRuleEditor {
    exec: Arc<dyn ApiExecutor>,
    locks: Arc<LockRegistry>,
    blueprint_id: ObjectId,
    retry: LinearRetry,
}

impl PolicyRuleEditor {
    pub fn new(exec: Arc<dyn ApiExecutor>, blueprint_id: ObjectId) -> Self {
        Self {
            exec,
            locks: Arc::new(LockRegistry::new()),
            blueprint_id,
            retry: LinearRetry::new(RetryConfig::default()),
        }
    }

    /// Share a lock registry with other editors. Every editor mutating the
    /// same policies must hold the same registry, or their
    /// fetch-splice-write cycles can interleave and lose updates.
    pub fn with_locks(mut self, locks: Arc<LockRegistry>) -> Self {
        self.locks = locks;
        self
    }

    /// Override the post-insert lookup retry schedule.
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = LinearRetry::new(config);
        self
    }

    fn policy_path(&self, policy_id: &ObjectId) -> String {
        format!(
            "/api/blueprints/{}/security-policies/{}",
            self.blueprint_id, policy_id
        )
    }

    async fn fetch(
        &self,
        policy_id: &ObjectId,
        cancel: &CancellationToken,
    ) -> Result<RawPolicy, CtError> {
        Ok(self.exec.get(&self.policy_path(policy_id), cancel).await?)
    }

    /// Fetch a policy's rules in server order, polished.
    pub async fn get_rules(
        &self,
        policy_id: &ObjectId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Rule>, CtError> {
        let policy = self.fetch(policy_id, cancel).await?;
        policy.rules.iter().map(RawRule::polish).collect()
    }

    /// Insert `rule` into the policy's rule list and return the identity
    /// the controller assigned to it.
    ///
    /// `position < 0` or `position >= len` appends, `position == 0`
    /// prepends, otherwise the rule lands before that index.
    ///
    /// The write happens under the per-policy advisory lock. The identity
    /// is then recovered by re-fetching and scanning for the rule's label;
    /// if two rules share a label, the first match in server order wins.
    pub async fn insert_rule(
        &self,
        policy_id: &ObjectId,
        rule: &Rule,
        position: i64,
        cancel: &CancellationToken,
    ) -> Result<ObjectId, CtError> {
        let mut raw = rule.raw();
        raw.id = None; // the controller assigns identity on write

        {
            let _guard = self.locks.acquire(policy_id.as_str()).await;
            let mut policy = self.fetch(policy_id, cancel).await?;
            let index = splice_index(position, policy.rules.len());
            tracing::debug!(
                policy = %policy_id,
                label = %rule.label,
                position,
                index,
                rules = policy.rules.len(),
                "inserting rule"
            );
            policy.rules.insert(index, raw);
            self.exec
                .put(&self.policy_path(policy_id), &policy, cancel)
                .await?;
        }

        self.lookup_rule_id(policy_id, &rule.label, cancel).await
    }

    /// Remove the rule with `rule_id` from the policy's rule list.
    ///
    /// Fails with [`CtError::RuleNotFound`] — making no write — when the
    /// id is absent.
    pub async fn delete_rule(
        &self,
        policy_id: &ObjectId,
        rule_id: &ObjectId,
        cancel: &CancellationToken,
    ) -> Result<(), CtError> {
        let _guard = self.locks.acquire(policy_id.as_str()).await;
        let mut policy = self.fetch(policy_id, cancel).await?;
        let index = policy
            .rules
            .iter()
            .position(|r| r.id.as_ref() == Some(rule_id))
            .ok_or_else(|| CtError::RuleNotFound {
                policy_id: policy_id.clone(),
                rule_id: rule_id.clone(),
            })?;
        policy.rules.remove(index);
        tracing::debug!(policy = %policy_id, rule = %rule_id, "deleting rule");
        self.exec
            .put(&self.policy_path(policy_id), &policy, cancel)
            .await?;
        Ok(())
    }

    /// Re-fetch the policy until a rule with `label` shows up with an
    /// assigned id, on the linear backoff schedule. Cancellation aborts the
    /// wait promptly rather than sitting out the full schedule.
    async fn lookup_rule_id(
        &self,
        policy_id: &ObjectId,
        label: &str,
        cancel: &CancellationToken,
    ) -> Result<ObjectId, CtError> {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled.into());
            }
            let policy = self.fetch(policy_id, cancel).await?;
            // First match wins on duplicate labels.
            if let Some(id) = policy
                .rules
                .iter()
                .find(|r| r.label == label)
                .and_then(|r| r.id.clone())
            {
                return Ok(id);
            }
            match self.retry.next_delay(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        policy = %policy_id,
                        label,
                        "rule not visible yet, retrying lookup"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ApiError::Cancelled.into()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => {
                    let elapsed = started.elapsed();
                    tracing::error!(
                        attempt,
                        elapsed_ms = elapsed.as_millis(),
                        policy = %policy_id,
                        label,
                        "rule never became visible"
                    );
                    return Err(CtError::NotFoundAfterRetries {
                        label: label.to_string(),
                        attempts: attempt,
                        elapsed,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortRanges;
    use crate::rule::{Protocol, RuleAction};
    use async_trait::async_trait;
    use fabricrest_core::{ApiRequest, HttpMethod};
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory controller: serves GETs from a committed view, assigns rule
    /// ids on PUT, and can hold back a PUT's effects for the next `lag` GETs
    /// to simulate eventual-consistency propagation.
    struct MockController {
        state: Mutex<MockState>,
        next_id: AtomicU64,
        lag: u32,
        yield_on_get: bool,
    }

    struct MockState {
        committed: Value,
        stale: Option<(Value, u32)>,
    }

    impl MockController {
        fn new(policy: Value, lag: u32) -> Self {
            Self {
                state: Mutex::new(MockState {
                    committed: policy,
                    stale: None,
                }),
                next_id: AtomicU64::new(1),
                lag,
                yield_on_get: false,
            }
        }

        /// Surrender the task between a GET's snapshot and its reply, the
        /// way a real round trip would, so concurrent callers can interleave.
        fn with_yielding_gets(mut self) -> Self {
            self.yield_on_get = true;
            self
        }

        fn committed_labels(&self) -> Vec<String> {
            let state = self.state.lock().unwrap();
            state.committed["rules"]
                .as_array()
                .unwrap()
                .iter()
                .map(|r| r["label"].as_str().unwrap().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl ApiExecutor for MockController {
        async fn call(&self, req: ApiRequest, _cancel: &CancellationToken) -> Result<Value, ApiError> {
            match req.method {
                HttpMethod::Get => {
                    let snapshot = {
                        let mut state = self.state.lock().unwrap();
                        if let Some((stale, remaining)) = state.stale.take() {
                            if remaining > 1 {
                                state.stale = Some((stale.clone(), remaining - 1));
                            }
                            stale
                        } else {
                            state.committed.clone()
                        }
                    };
                    if self.yield_on_get {
                        tokio::task::yield_now().await;
                    }
                    Ok(snapshot)
                }
                HttpMethod::Put => {
                    let mut state = self.state.lock().unwrap();
                    let previous = state.committed.clone();
                    let mut body = req.body.expect("PUT requires a body");
                    for rule in body["rules"].as_array_mut().unwrap() {
                        if rule.get("id").is_none() {
                            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
                            rule["id"] = json!(format!("rule-{n}"));
                        }
                    }
                    state.committed = body;
                    if self.lag > 0 {
                        state.stale = Some((previous, self.lag));
                    }
                    Ok(Value::Null)
                }
                other => panic!("unexpected method {other}"),
            }
        }
    }

    fn policy_with_rules(labels: &[&str]) -> Value {
        let rules: Vec<Value> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                json!({
                    "id": format!("seed-{i}"),
                    "label": label,
                    "description": "",
                    "protocol": "tcp",
                    "action": "permit",
                    "src_port": "any",
                    "dst_port": "any",
                })
            })
            .collect();
        json!({
            "id": "policy-1",
            "label": "test policy",
            "enabled": true,
            "rules": rules,
        })
    }

    fn rule(label: &str) -> Rule {
        Rule {
            id: None,
            label: label.to_string(),
            description: String::new(),
            protocol: Protocol::Tcp,
            action: RuleAction::Permit,
            src_port: PortRanges::any(),
            dst_port: PortRanges::parse("443").unwrap(),
            tcp_state: None,
        }
    }

    fn make_editor(controller: &Arc<MockController>) -> PolicyRuleEditor {
        PolicyRuleEditor::new(
            Arc::clone(controller) as Arc<dyn ApiExecutor>,
            ObjectId::from("bp-1"),
        )
        .with_retry(RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
        })
    }

    #[test]
    fn splice_index_branches() {
        assert_eq!(splice_index(-1, 2), 2); // negative appends
        assert_eq!(splice_index(0, 2), 0); // zero prepends
        assert_eq!(splice_index(1, 2), 1); // interior inserts before index
        assert_eq!(splice_index(2, 2), 2); // past the end appends
        assert_eq!(splice_index(7, 2), 2);
        assert_eq!(splice_index(3, 0), 0); // empty list
    }

    #[tokio::test]
    async fn insert_positions() {
        let cancel = CancellationToken::new();
        let cases: [(i64, &[&str]); 4] = [
            (1, &["A", "C", "B"]),
            (0, &["C", "A", "B"]),
            (-1, &["A", "B", "C"]),
            (9, &["A", "B", "C"]),
        ];
        for (position, expected) in cases {
            let controller = Arc::new(MockController::new(policy_with_rules(&["A", "B"]), 0));
            let editor = make_editor(&controller);
            let id = editor
                .insert_rule(&ObjectId::from("policy-1"), &rule("C"), position, &cancel)
                .await
                .unwrap();
            assert_eq!(id, ObjectId::from("rule-1"));
            assert_eq!(controller.committed_labels(), expected);
        }
    }

    #[tokio::test]
    async fn insert_into_empty_list() {
        let cancel = CancellationToken::new();
        for position in [-1, 0, 5] {
            let controller = Arc::new(MockController::new(policy_with_rules(&[]), 0));
            let editor = make_editor(&controller);
            editor
                .insert_rule(&ObjectId::from("policy-1"), &rule("C"), position, &cancel)
                .await
                .unwrap();
            assert_eq!(controller.committed_labels(), ["C"]);
        }
    }

    #[tokio::test]
    async fn shared_lock_registry_serializes_concurrent_inserts() {
        // Two editors over the same controller, same policy. The yielding
        // GET opens a window between each editor's fetch and write; only a
        // shared registry keeps one insert from clobbering the other.
        let controller =
            Arc::new(MockController::new(policy_with_rules(&[]), 0).with_yielding_gets());
        let locks = Arc::new(LockRegistry::new());

        let mut tasks = Vec::new();
        for label in ["X", "Y"] {
            let editor = make_editor(&controller).with_locks(Arc::clone(&locks));
            tasks.push(tokio::spawn(async move {
                let new_rule = rule(label);
                editor
                    .insert_rule(
                        &ObjectId::from("policy-1"),
                        &new_rule,
                        -1,
                        &CancellationToken::new(),
                    )
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut labels = controller.committed_labels();
        labels.sort();
        assert_eq!(labels, ["X", "Y"]);
    }

    #[tokio::test(start_paused = true)]
    async fn insert_survives_propagation_lag() {
        // New rule only becomes visible on the third post-write fetch.
        let controller = Arc::new(MockController::new(policy_with_rules(&["A"]), 2));
        let editor = make_editor(&controller);
        let id = editor
            .insert_rule(
                &ObjectId::from("policy-1"),
                &rule("B"),
                -1,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(id, ObjectId::from("rule-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn insert_lookup_exhausts_retry_budget() {
        let controller = Arc::new(MockController::new(policy_with_rules(&["A"]), 99));
        let editor = PolicyRuleEditor::new(
            Arc::clone(&controller) as Arc<dyn ApiExecutor>,
            ObjectId::from("bp-1"),
        )
        .with_retry(RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
        });
        let err = editor
            .insert_rule(
                &ObjectId::from("policy-1"),
                &rule("B"),
                -1,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        match err {
            CtError::NotFoundAfterRetries { label, attempts, elapsed } => {
                assert_eq!(label, "B");
                assert_eq!(attempts, 3);
                // Two waits: 1*10ms + 2*10ms.
                assert!(elapsed >= Duration::from_millis(30));
            }
            other => panic!("unexpected error: {other}"),
        }
        // The write itself went through; only the lookup gave up.
        assert_eq!(controller.committed_labels(), ["A", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_lookup_backoff() {
        let controller = Arc::new(MockController::new(policy_with_rules(&["A"]), 99));
        let editor = make_editor(&controller);
        let cancel = CancellationToken::new();

        let policy_id = ObjectId::from("policy-1");
        let rule_b = rule("B");
        let insert = editor.insert_rule(&policy_id, &rule_b, -1, &cancel);
        tokio::pin!(insert);

        // Let the write and first lookup happen, then cancel mid-backoff.
        tokio::select! {
            _ = &mut insert => panic!("insert should still be backing off"),
            _ = tokio::time::sleep(Duration::from_millis(5)) => cancel.cancel(),
        }
        match insert.await.unwrap_err() {
            CtError::Api(ApiError::Cancelled) => {}
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn delete_existing_rule() {
        let controller = Arc::new(MockController::new(policy_with_rules(&["A", "B"]), 0));
        let editor = make_editor(&controller);
        editor
            .delete_rule(
                &ObjectId::from("policy-1"),
                &ObjectId::from("seed-1"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(controller.committed_labels(), ["A"]);
    }

    #[tokio::test]
    async fn delete_missing_rule_makes_no_write() {
        let controller = Arc::new(MockController::new(policy_with_rules(&["A", "B"]), 0));
        let editor = make_editor(&controller);
        let err = editor
            .delete_rule(
                &ObjectId::from("policy-1"),
                &ObjectId::from("no-such-rule"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        match err {
            CtError::RuleNotFound { rule_id, .. } => {
                assert_eq!(rule_id, ObjectId::from("no-such-rule"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(controller.committed_labels(), ["A", "B"]);
    }

    #[tokio::test]
    async fn insert_then_delete_end_to_end() {
        let cancel = CancellationToken::new();
        let controller = Arc::new(MockController::new(policy_with_rules(&["A", "B"]), 0));
        let editor = make_editor(&controller);
        let policy_id = ObjectId::from("policy-1");

        editor
            .insert_rule(&policy_id, &rule("C"), 1, &cancel)
            .await
            .unwrap();
        assert_eq!(controller.committed_labels(), ["A", "C", "B"]);

        editor
            .delete_rule(&policy_id, &ObjectId::from("seed-1"), &cancel)
            .await
            .unwrap();
        assert_eq!(controller.committed_labels(), ["A", "C"]);

        let rules = editor.get_rules(&policy_id, &cancel).await.unwrap();
        let labels: Vec<&str> = rules.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["A", "C"]);
    }

    #[tokio::test]
    async fn write_back_preserves_unknown_policy_fields() {
        let controller = Arc::new(MockController::new(policy_with_rules(&["A"]), 0));
        let editor = make_editor(&controller);
        editor
            .insert_rule(
                &ObjectId::from("policy-1"),
                &rule("B"),
                -1,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let state = controller.state.lock().unwrap();
        assert_eq!(state.committed["enabled"], json!(true));
    }
}
