//! Daily birthday notifications for agents whose `identity.date_of_birth`
//! matches today's month/day. Ticks hourly and guards against firing twice
//! on the same calendar day with a `(AgentId, NaiveDate)` dedup set.

use crate::manager::LifecycleManager;
use agentcore_types::{AgentId, LifecycleEventKind};
use chrono::{Datelike, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;

/// External callback invoked once per agent per day when today matches the
/// agent's configured birth month/day.
pub trait BirthdayHook: Send + Sync {
    /// Called once, synchronously, for each agent whose birthday is today.
    /// `age` is years elapsed since `date_of_birth`, as of today.
    fn notify(&self, agent_id: AgentId, month: u32, day: u32, age: u32);
}

/// Full years elapsed between `birth` and `today`.
fn age_on(birth: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

impl LifecycleManager {
    /// Start the hourly birthday-check ticker. A prior ticker, if any, is
    /// aborted first. A no-op if no `BirthdayHook` was configured.
    pub fn start_birthday_scheduler(self: &Arc<Self>) {
        let mut guard = self.birthday_task.lock().expect("birthday task mutex poisoned");
        if let Some(existing) = guard.take() {
            existing.abort();
        }
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                manager.birthday_tick().await;
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        });
        *guard = Some(handle);
    }

    /// One birthday-check pass over every managed agent.
    pub(crate) async fn birthday_tick(self: &Arc<Self>) {
        let Some(hook) = self.birthday_hook.clone() else {
            return;
        };
        let today = Utc::now().date_naive();
        let (month, day) = (today.month(), today.day());
        let handles: Vec<_> = self.agents.iter().map(|entry| (*entry.key(), entry.value().clone())).collect();
        for (id, handle) in handles {
            let agent = handle.lock().await;
            let Some(birth) = agent.identity_date_of_birth() else {
                continue;
            };
            if birth.month() != month || birth.day() != day {
                continue;
            }
            let key = (id, today);
            if !self.fired_birthdays.insert(key) {
                continue;
            }
            let age = age_on(birth, today);
            let snapshot = agent.clone();
            drop(agent);
            hook.notify(id, month, day, age);
            self.emit(
                &snapshot,
                LifecycleEventKind::Birthday,
                serde_json::json!({ "month": month, "day": day, "age": age }),
            )
            .await;
        }
    }
}

trait IdentityBirthday {
    fn identity_date_of_birth(&self) -> Option<NaiveDate>;
}

impl IdentityBirthday for agentcore_types::ManagedAgent {
    fn identity_date_of_birth(&self) -> Option<NaiveDate> {
        self.config.identity.date_of_birth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_budget::BudgetEnforcer;
    use agentcore_bus::EventBus;
    use agentcore_deploy::DeployerRegistry;
    use agentcore_store_memory::MemoryBackend;
    use agentcore_types::{AgentConfig, IdentityConfig, OrgId};
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    struct CountingHook {
        calls: AtomicUsize,
        last_age: AtomicU32,
    }

    impl BirthdayHook for CountingHook {
        fn notify(&self, _agent_id: AgentId, _month: u32, _day: u32, age: u32) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_age.store(age, Ordering::SeqCst);
        }
    }

    #[test]
    fn age_on_computes_full_years_elapsed() {
        let birth = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()), 34);
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()), 33);
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2024, 6, 16).unwrap()), 34);
    }

    #[tokio::test]
    async fn fires_once_per_day_for_matching_birthday() {
        let today = Utc::now().date_naive();
        let hook = Arc::new(CountingHook { calls: AtomicUsize::new(0), last_age: AtomicU32::new(0) });
        let manager = LifecycleManager::new(
            EventBus::new(),
            DeployerRegistry::new(),
            Arc::new(BudgetEnforcer::new()),
            Some(hook.clone()),
        );
        manager.set_persistence(Arc::new(MemoryBackend::new())).await.unwrap();
        let birth = NaiveDate::from_ymd_opt(today.year() - 30, today.month(), today.day()).unwrap();
        let config = AgentConfig {
            identity: IdentityConfig {
                date_of_birth: Some(birth),
                ..Default::default()
            },
            ..Default::default()
        };
        let agent = manager.create_agent(OrgId::new(), config).await.unwrap();

        manager.birthday_tick().await;
        manager.birthday_tick().await;

        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
        assert_eq!(hook.last_age.load(Ordering::SeqCst), 30);
        let _ = agent;
    }

    #[tokio::test]
    async fn does_not_fire_for_non_matching_date() {
        let hook = Arc::new(CountingHook { calls: AtomicUsize::new(0), last_age: AtomicU32::new(0) });
        let manager = LifecycleManager::new(
            EventBus::new(),
            DeployerRegistry::new(),
            Arc::new(BudgetEnforcer::new()),
            Some(hook.clone()),
        );
        manager.set_persistence(Arc::new(MemoryBackend::new())).await.unwrap();
        let today = Utc::now().date_naive();
        if today.month() == 1 && today.day() == 1 {
            return;
        }
        let config = AgentConfig {
            identity: IdentityConfig {
                date_of_birth: Some(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()),
                ..Default::default()
            },
            ..Default::default()
        };
        manager.create_agent(OrgId::new(), config).await.unwrap();
        manager.birthday_tick().await;
        assert_eq!(hook.calls.load(Ordering::SeqCst), 0);
    }
}
