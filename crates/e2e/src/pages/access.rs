//! Role-based access probing
//!
//! The dashboard hides areas a role may not use, either by redirecting
//! away or by rendering a permission notice in place. A probe observes
//! which one happened. It asserts nothing: whether the answer is right is
//! decided by the caller against [`haunt_fixtures::Role::can_access`].

use tracing::debug;

use haunt_fixtures::{Area, Routes};

use crate::base_page::{path_and_query, BasePage, GotoOptions};
use crate::driver::TextMatch;
use crate::error::E2eResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied,
}

impl Access {
    pub fn from_allowed(allowed: bool) -> Self {
        if allowed {
            Access::Allowed
        } else {
            Access::Denied
        }
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Access::Allowed => write!(f, "allowed"),
            Access::Denied => write!(f, "denied"),
        }
    }
}

/// Visit `area` of the organization and report whether the page let us in
pub async fn probe_access(base: &BasePage, org_id: &str, area: Area) -> E2eResult<Access> {
    let target = Routes::dashboard(org_id).area(area);
    base.goto(&target, GotoOptions::default()).await?;
    base.wait_for_loading_complete().await?;

    let landed = path_and_query(&base.current_url().await?)?;
    if !landed.starts_with(&target) {
        debug!("{} redirected to {}", target, landed);
        return Ok(Access::Denied);
    }

    let notice = base
        .by_text(TextMatch::regex_ci(
            "permission|not authorized|access denied|don't have access",
        ))
        .first();
    if notice.probe_visible(base.timeouts().fast).await {
        debug!("{} shows a permission notice", target);
        return Ok(Access::Denied);
    }
    Ok(Access::Allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockState};
    use haunt_fixtures::Timeouts;
    use std::sync::Arc;
    use std::time::Duration;

    fn base(mock: &Arc<MockDriver>) -> BasePage {
        BasePage::new(mock.clone(), "http://localhost:3000")
            .with_timeouts(Timeouts::uniform(Duration::from_secs(1)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_is_denied() {
        let mock = Arc::new(MockDriver::new());
        mock.on_navigate("/nightmare-manor/payments", |s: &mut MockState| {
            s.set_url("http://localhost:3000/nightmare-manor")
        });
        let access = probe_access(&base(&mock), "nightmare-manor", Area::Payments)
            .await
            .unwrap();
        assert_eq!(access, Access::Denied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_notice_is_denied() {
        let mock = Arc::new(MockDriver::new());
        let page = base(&mock);
        let notice = page
            .by_text(TextMatch::regex_ci(
                "permission|not authorized|access denied|don't have access",
            ))
            .first();
        mock.on_navigate("/nightmare-manor/settings", {
            let notice = notice.selector().clone();
            move |s: &mut MockState| s.show(&notice, "You don't have permission to view this page")
        });
        let access = probe_access(&page, "nightmare-manor", Area::Settings)
            .await
            .unwrap();
        assert_eq!(access, Access::Denied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_page_is_allowed() {
        let mock = Arc::new(MockDriver::new());
        let access = probe_access(&base(&mock), "nightmare-manor", Area::Orders)
            .await
            .unwrap();
        assert_eq!(access, Access::Allowed);
    }
}
