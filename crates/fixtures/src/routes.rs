//! URL path builders for the dashboard, storefront and auth pages
//!
//! Pure string templating. Inputs are not validated; callers supply IDs
//! and slugs that exist in the seed.

use crate::users::Area;

pub struct Routes;

impl Routes {
    pub fn login() -> &'static str {
        "/login"
    }

    pub fn signup() -> &'static str {
        "/signup"
    }

    pub fn forgot_password() -> &'static str {
        "/forgot-password"
    }

    pub fn reset_password() -> &'static str {
        "/reset-password"
    }

    pub fn new_organization() -> &'static str {
        "/organizations/new"
    }

    pub fn admin() -> &'static str {
        "/admin"
    }

    pub fn dashboard(org_id: &str) -> DashboardRoutes {
        DashboardRoutes {
            root: format!("/{}", org_id),
        }
    }

    pub fn storefront(identifier: &str) -> StorefrontRoutes {
        StorefrontRoutes {
            root: format!("/s/{}", identifier),
        }
    }
}

/// Routes under `/{org_id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardRoutes {
    root: String,
}

impl DashboardRoutes {
    fn sub(&self, path: &str) -> String {
        format!("{}/{}", self.root, path)
    }

    pub fn home(&self) -> String {
        self.root.clone()
    }

    pub fn attractions(&self) -> String {
        self.sub("attractions")
    }

    pub fn attraction(&self, attraction_id: &str) -> String {
        self.sub(&format!("attractions/{}", attraction_id))
    }

    pub fn staff(&self) -> String {
        self.sub("staff")
    }

    pub fn staff_detail(&self, staff_id: &str) -> String {
        self.sub(&format!("staff/{}", staff_id))
    }

    pub fn schedule(&self) -> String {
        self.sub("schedule")
    }

    pub fn ticketing(&self) -> String {
        self.sub("ticketing")
    }

    pub fn ticket_types(&self) -> String {
        self.sub("ticketing/ticket-types")
    }

    pub fn orders(&self) -> String {
        self.sub("ticketing/orders")
    }

    pub fn promo_codes(&self) -> String {
        self.sub("ticketing/promo-codes")
    }

    pub fn check_in(&self) -> String {
        self.sub("check-in")
    }

    pub fn payments(&self) -> String {
        self.sub("payments")
    }

    pub fn settings(&self) -> String {
        self.sub("settings")
    }

    pub fn members(&self) -> String {
        self.sub("members")
    }

    pub fn notifications(&self) -> String {
        self.sub("notifications")
    }

    pub fn inventory(&self) -> String {
        self.sub("inventory")
    }

    pub fn storefront(&self) -> String {
        self.sub("storefront")
    }

    pub fn storefront_pages(&self) -> String {
        self.sub("storefront/pages")
    }

    /// Entry page of a guarded area
    pub fn area(&self, area: Area) -> String {
        match area {
            Area::Attractions => self.attractions(),
            Area::Staff => self.staff(),
            Area::Schedule => self.schedule(),
            Area::Ticketing => self.ticketing(),
            Area::Orders => self.orders(),
            Area::CheckIn => self.check_in(),
            Area::Payments => self.payments(),
            Area::Settings => self.settings(),
            Area::Members => self.members(),
            Area::Storefront => self.storefront(),
            Area::Admin => Routes::admin().to_string(),
        }
    }
}

/// Routes under `/s/{identifier}`, the public storefront
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorefrontRoutes {
    root: String,
}

impl StorefrontRoutes {
    pub fn home(&self) -> String {
        self.root.clone()
    }

    pub fn tickets(&self) -> String {
        format!("{}/tickets", self.root)
    }

    pub fn checkout(&self) -> String {
        format!("{}/checkout", self.root)
    }

    pub fn checkout_success(&self, session_id: &str) -> String {
        format!("{}/checkout/success?session_id={}", self.root, session_id)
    }

    pub fn page(&self, slug: &str) -> String {
        format!("{}/{}", self.root, slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("org-1", "staff-9")]
    #[test_case("a0000000-0000-0000-0000-000000000001", "x")]
    fn test_staff_detail_is_pure(org_id: &str, staff_id: &str) {
        let expected = format!("/{}/staff/{}", org_id, staff_id);
        let routes = Routes::dashboard(org_id);
        assert_eq!(routes.staff_detail(staff_id), expected);
        assert_eq!(routes.staff_detail(staff_id), expected);
    }

    #[test]
    fn test_storefront_routes() {
        let routes = Routes::storefront("haunted-mansion");
        assert_eq!(routes.home(), "/s/haunted-mansion");
        assert_eq!(
            routes.checkout_success("cs_test_123"),
            "/s/haunted-mansion/checkout/success?session_id=cs_test_123"
        );
        assert_eq!(routes.page("faq"), "/s/haunted-mansion/faq");
    }

    #[test]
    fn test_area_routes() {
        let routes = Routes::dashboard("org");
        assert_eq!(routes.area(Area::Orders), "/org/ticketing/orders");
        assert_eq!(routes.area(Area::CheckIn), "/org/check-in");
        assert_eq!(routes.area(Area::Admin), "/admin");
    }
}
