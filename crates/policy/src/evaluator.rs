//! 组织访问策略评估
//!
//! 针对一次请求的 (组织, 用户, 会话) 读取策略配置与会话/用户状态，
//! 给出每项策略的合规报告和总体放行结论。评估只读，不产生副作用。

use crate::license::LicenseGate;
use crate::session::{IssuedAt, MaxSessionLengthReport, session_length_report};
use chrono::{DateTime, TimeDelta, Utc};
use gatekeeper_common::entities::{orgs, sessions, users};
use gatekeeper_common::{BuildMode, PolicyStore, Result, metrics};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

const MS_PER_DAY: f64 = 86_400_000.0;

/// 调用方已持有的数据行，为 `None` 的从存储加载
#[derive(Debug, Clone, Default)]
pub struct Preloaded {
    pub org: Option<orgs::Model>,
    pub user: Option<users::Model>,
    pub session: Option<sessions::Model>,
}

#[derive(Debug, Clone)]
pub struct PolicyRequest<'a> {
    pub org_id: &'a str,
    pub user_id: &'a str,
    pub session_id: &'a str,
    pub preloaded: Preloaded,
}

impl<'a> PolicyRequest<'a> {
    pub fn new(org_id: &'a str, user_id: &'a str, session_id: &'a str) -> Self {
        Self {
            org_id,
            user_id,
            session_id,
            preloaded: Preloaded::default(),
        }
    }

    pub fn with_org(mut self, org: orgs::Model) -> Self {
        self.preloaded.org = Some(org);
        self
    }

    pub fn with_user(mut self, user: users::Model) -> Self {
        self.preloaded.user = Some(user);
        self
    }

    pub fn with_session(mut self, session: sessions::Model) -> Self {
        self.preloaded.session = Some(session);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordAgeReport {
    pub compliant: bool,
    pub max_password_age_days: i64,
    pub password_age_days: f64,
}

/// 各项策略的结果；字段为 `None` 表示该策略不适用，而不是未通过
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyReport {
    /// 用户是否满足组织的双因素认证要求
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_two_factor: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_session_length: Option<MaxSessionLengthReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_age: Option<PasswordAgeReport>,
}

impl PolicyReport {
    pub fn is_compliant(&self) -> bool {
        self.required_two_factor != Some(false)
            && self.max_session_length.as_ref().is_none_or(|r| r.compliant)
            && self.password_age.as_ref().is_none_or(|r| r.compliant)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policies: Option<PolicyReport>,
}

impl PolicyDecision {
    fn allow_unchecked() -> Self {
        Self {
            allowed: true,
            error: None,
            policies: None,
        }
    }

    fn deny(error: impl Into<String>) -> Self {
        Self {
            allowed: false,
            error: Some(error.into()),
            policies: None,
        }
    }

    fn from_report(report: PolicyReport) -> Self {
        Self {
            allowed: report.is_compliant(),
            error: None,
            policies: Some(report),
        }
    }
}

/// 基于同一组数据行计算所有适用的策略
pub fn evaluate_policies(
    org: &orgs::Model,
    user: &users::Model,
    session: &sessions::Model,
    now: DateTime<Utc>,
) -> PolicyReport {
    let mut report = PolicyReport::default();

    if user.is_internal() && org.requires_two_factor() {
        report.required_two_factor = Some(user.two_factor_enabled);
    }

    if let Some(max_hours) = org.session_length_limit_hours() {
        report.max_session_length = Some(session_length_report(session.issued_at(), max_hours, now));
    }

    if user.is_internal() {
        if let Some(max_days) = org.password_expiry_limit_days() {
            let last_change = user.last_password_change.map(|t| t.with_timezone(&Utc));
            report.password_age = Some(match last_change {
                Some(changed_at) => {
                    let age = now - changed_at;
                    PasswordAgeReport {
                        compliant: age <= TimeDelta::days(max_days),
                        max_password_age_days: max_days,
                        password_age_days: age.num_milliseconds() as f64 / MS_PER_DAY,
                    }
                }
                None => PasswordAgeReport {
                    compliant: false,
                    max_password_age_days: max_days,
                    password_age_days: max_days as f64,
                },
            });
        }
    }

    report
}

fn id_or_preloaded(id: &str, preloaded: Option<&str>) -> String {
    if id.is_empty() {
        preloaded.unwrap_or_default().to_string()
    } else {
        id.to_string()
    }
}

pub struct AccessPolicyEvaluator {
    store: Arc<dyn PolicyStore>,
    license: Arc<dyn LicenseGate>,
    build_mode: BuildMode,
}

impl AccessPolicyEvaluator {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        license: Arc<dyn LicenseGate>,
        build_mode: BuildMode,
    ) -> Self {
        Self {
            store,
            license,
            build_mode,
        }
    }

    pub async fn evaluate(&self, request: PolicyRequest<'_>) -> Result<PolicyDecision> {
        self.evaluate_at(request, Utc::now()).await
    }

    pub async fn evaluate_at(
        &self,
        request: PolicyRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<PolicyDecision> {
        let decision = self.decide(request, now).await?;
        let outcome = match (&decision.policies, decision.allowed) {
            (None, true) => "bypassed",
            (_, true) => "allowed",
            (_, false) => "denied",
        };
        metrics::inc_policy_evaluation(outcome);
        Ok(decision)
    }

    async fn decide(&self, request: PolicyRequest<'_>, now: DateTime<Utc>) -> Result<PolicyDecision> {
        let PolicyRequest {
            org_id,
            user_id,
            session_id,
            preloaded,
        } = request;

        // 请求未给出的 ID 从预加载行中取
        let org_id = id_or_preloaded(
            org_id,
            preloaded.org.as_ref().map(|o| o.org_id.as_str()),
        );
        let user_id = id_or_preloaded(
            user_id,
            preloaded.user.as_ref().map(|u| u.user_id.as_str()),
        );
        let session_id = id_or_preloaded(
            session_id,
            preloaded.session.as_ref().map(|s| s.session_id.as_str()),
        );

        if org_id.is_empty() {
            return Ok(PolicyDecision::deny("Organization ID is required"));
        }
        if user_id.is_empty() {
            return Ok(PolicyDecision::deny("User ID is required"));
        }
        if session_id.is_empty() {
            return Ok(PolicyDecision::deny("Session ID is required"));
        }

        if self.build_mode == BuildMode::Enterprise && !self.license.is_unlocked().await? {
            debug!(org_id = %org_id, "license locked, skipping access policies");
            return Ok(PolicyDecision::allow_unchecked());
        }

        let org = match preloaded.org {
            Some(org) if org.org_id == org_id => org,
            Some(org) => {
                warn!(
                    org_id = %org_id,
                    preloaded = %org.org_id,
                    "preloaded organization does not match request"
                );
                return Ok(PolicyDecision::deny("Organization not found"));
            }
            None => match self.store.find_org(&org_id).await? {
                Some(org) => org,
                None => return Ok(PolicyDecision::deny("Organization not found")),
            },
        };
        let user = match preloaded.user {
            Some(user) if user.user_id == user_id => user,
            Some(user) => {
                warn!(
                    user_id = %user_id,
                    preloaded = %user.user_id,
                    "preloaded user does not match request"
                );
                return Ok(PolicyDecision::deny("User not found"));
            }
            None => match self.store.find_user(&user_id).await? {
                Some(user) => user,
                None => return Ok(PolicyDecision::deny("User not found")),
            },
        };
        let session = match preloaded.session {
            Some(session) if session.session_id == session_id => session,
            Some(session) => {
                warn!(
                    session_id = %session_id,
                    preloaded = %session.session_id,
                    "preloaded session does not match request"
                );
                return Ok(PolicyDecision::deny("Session not found"));
            }
            None => match self.store.find_session(&session_id).await? {
                Some(session) => session,
                None => return Ok(PolicyDecision::deny("Session not found")),
            },
        };

        if session.user_id != user_id {
            warn!(
                org_id = %org_id,
                user_id = %user_id,
                session_id = %session_id,
                "session does not belong to the user"
            );
            return Ok(PolicyDecision::deny("Session does not belong to the user"));
        }

        let decision = PolicyDecision::from_report(evaluate_policies(&org, &user, &session, now));
        if !decision.allowed {
            debug!(
                org_id = %org_id,
                user_id = %user_id,
                session_id = %session_id,
                policies = ?decision.policies,
                "access policy not satisfied"
            );
        }
        Ok(decision)
    }
}
