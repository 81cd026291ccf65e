use chrono::{DateTime, TimeDelta, Utc};
use gatekeeper_common::entities::{orgs, resource_sessions, sessions};
use serde::Serialize;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// 带有可选签发时间的会话
pub trait IssuedAt {
    fn issued_at(&self) -> Option<DateTime<Utc>>;
}

impl IssuedAt for sessions::Model {
    fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at.map(|t| t.with_timezone(&Utc))
    }
}

impl IssuedAt for resource_sessions::Model {
    fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at.map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxSessionLengthReport {
    pub compliant: bool,
    pub max_session_length_hours: i64,
    pub session_age_hours: f64,
}

/// 比较会话时长与 `max_hours`；没有签发时间的会话视为不合规，时长按上限计
pub fn session_length_report(
    issued_at: Option<DateTime<Utc>>,
    max_hours: i64,
    now: DateTime<Utc>,
) -> MaxSessionLengthReport {
    match issued_at {
        Some(issued_at) => {
            let age = now - issued_at;
            MaxSessionLengthReport {
                compliant: age <= TimeDelta::hours(max_hours),
                max_session_length_hours: max_hours,
                session_age_hours: age.num_milliseconds() as f64 / MS_PER_HOUR,
            }
        }
        None => MaxSessionLengthReport {
            compliant: false,
            max_session_length_hours: max_hours,
            session_age_hours: max_hours as f64,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionLengthCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionLengthCheck {
    fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// 单独执行会话时长检查，供不需要完整策略集的调用方使用（如资源会话）
pub fn check_session_length<S: IssuedAt + ?Sized>(
    session: &S,
    org: &orgs::Model,
) -> SessionLengthCheck {
    check_session_length_at(session, org, Utc::now())
}

pub fn check_session_length_at<S: IssuedAt + ?Sized>(
    session: &S,
    org: &orgs::Model,
    now: DateTime<Utc>,
) -> SessionLengthCheck {
    let Some(max_hours) = org.session_length_limit_hours() else {
        return SessionLengthCheck::valid();
    };

    let issued_at = session.issued_at();
    if issued_at.is_none() {
        return SessionLengthCheck::invalid("Session has no issued-at timestamp");
    }

    let report = session_length_report(issued_at, max_hours, now);
    if report.compliant {
        SessionLengthCheck::valid()
    } else {
        SessionLengthCheck::invalid(format!(
            "Session has exceeded the maximum length of {max_hours} hours"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn org(max_hours: Option<i32>) -> orgs::Model {
        orgs::Model {
            org_id: "org_1".to_string(),
            name: "Acme".to_string(),
            require_two_factor: None,
            max_session_length_hours: max_hours,
            password_expiry_days: None,
            settings_log_retention_days: None,
        }
    }

    fn session(issued_at: Option<DateTime<Utc>>) -> sessions::Model {
        sessions::Model {
            session_id: "sess_1".to_string(),
            user_id: "user_1".to_string(),
            expires_at: (now() + TimeDelta::days(30)).into(),
            issued_at: issued_at.map(Into::into),
        }
    }

    fn resource_session(issued_at: Option<DateTime<Utc>>) -> resource_sessions::Model {
        resource_sessions::Model {
            session_id: "rsess_1".to_string(),
            resource_id: 7,
            user_session_id: Some("sess_1".to_string()),
            expires_at: (now() + TimeDelta::days(1)).into(),
            issued_at: issued_at.map(Into::into),
        }
    }

    #[test]
    fn test_unenforced_when_unset_or_zero() {
        let stale = session(None);
        assert!(check_session_length_at(&stale, &org(None), now()).valid);
        assert!(check_session_length_at(&stale, &org(Some(0)), now()).valid);
    }

    #[test]
    fn test_within_limit() {
        let s = session(Some(now() - TimeDelta::minutes(30)));
        let check = check_session_length_at(&s, &org(Some(1)), now());
        assert_eq!(check, SessionLengthCheck::valid());
    }

    #[test]
    fn test_exactly_at_limit_is_valid() {
        let s = session(Some(now() - TimeDelta::hours(1)));
        assert!(check_session_length_at(&s, &org(Some(1)), now()).valid);
    }

    #[test]
    fn test_exceeded_limit() {
        let s = session(Some(now() - TimeDelta::hours(2)));
        let check = check_session_length_at(&s, &org(Some(1)), now());
        assert!(!check.valid);
        assert_eq!(
            check.error.as_deref(),
            Some("Session has exceeded the maximum length of 1 hours")
        );
    }

    #[test]
    fn test_missing_issue_time_fails_closed() {
        let check = check_session_length_at(&session(None), &org(Some(24)), now());
        assert!(!check.valid);
        assert_eq!(
            check.error.as_deref(),
            Some("Session has no issued-at timestamp")
        );
    }

    #[test]
    fn test_resource_sessions_are_checked_too() {
        let fresh = resource_session(Some(now() - TimeDelta::hours(3)));
        let old = resource_session(Some(now() - TimeDelta::hours(30)));
        assert!(check_session_length_at(&fresh, &org(Some(24)), now()).valid);
        assert!(!check_session_length_at(&old, &org(Some(24)), now()).valid);
    }

    #[test]
    fn test_report_ages() {
        let report = session_length_report(Some(now() - TimeDelta::minutes(90)), 1, now());
        assert!(!report.compliant);
        assert!((report.session_age_hours - 1.5).abs() < 1e-9);

        let report = session_length_report(None, 8, now());
        assert!(!report.compliant);
        assert_eq!(report.session_age_hours, 8.0);
        assert_eq!(report.max_session_length_hours, 8);
    }
}
