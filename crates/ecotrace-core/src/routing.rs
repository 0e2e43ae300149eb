//! Role-gated client routes
//!
//! Every screen the client offers is a [`Route`]. Public routes are open to
//! anyone; the rest require a signed-in user with one specific role. A user
//! opening another role's route is sent to their own dashboard, an anonymous
//! user to the login page.

use std::fmt;

use crate::error::AccessDenied;
use crate::models::{AuthContext, Role};

pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    PublicBatch(i64),

    ManufacturerDashboard,
    ProductList,
    CreateProduct,
    ProductView(i64),
    CreateBatch { product_id: i64 },
    BatchList,

    TransporterDashboard,
    /// Transport intake; `batch` pre-seeds resolution and skips scanning.
    CreateTransport { batch: Option<i64> },
    TransportList,
    TransportDetail(i64),

    LabDashboard,
    LabReportList,
    PendingTests,
    CreateReport { batch_id: i64 },
    LabReportDetail(i64),
}

impl Route {
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Route::Home | Route::Login | Route::Register | Route::PublicBatch(_) => None,
            Route::ManufacturerDashboard
            | Route::ProductList
            | Route::CreateProduct
            | Route::ProductView(_)
            | Route::CreateBatch { .. }
            | Route::BatchList => Some(Role::Manufacturer),
            Route::TransporterDashboard
            | Route::CreateTransport { .. }
            | Route::TransportList
            | Route::TransportDetail(_) => Some(Role::Transporter),
            Route::LabDashboard
            | Route::LabReportList
            | Route::PendingTests
            | Route::CreateReport { .. }
            | Route::LabReportDetail(_) => Some(Role::Lab),
        }
    }

    pub fn is_public(&self) -> bool {
        self.required_role().is_none()
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login => LOGIN_PATH.to_string(),
            Route::Register => "/register".to_string(),
            Route::PublicBatch(id) => format!("/public/batch/{}", id),
            Route::ManufacturerDashboard => "/manufacturer/dashboard".to_string(),
            Route::ProductList => "/manufacturer/products".to_string(),
            Route::CreateProduct => "/manufacturer/products/create".to_string(),
            Route::ProductView(id) => format!("/manufacturer/products/{}", id),
            Route::CreateBatch { product_id } => {
                format!("/manufacturer/batch/create/{}", product_id)
            }
            Route::BatchList => "/manufacturer/batches".to_string(),
            Route::TransporterDashboard => "/transporter/dashboard".to_string(),
            Route::CreateTransport { batch: None } => "/transporter/create".to_string(),
            Route::CreateTransport { batch: Some(id) } => {
                format!("/transporter/create?batch={}", id)
            }
            Route::TransportList => "/transporter/transports".to_string(),
            Route::TransportDetail(id) => format!("/transporter/transports/{}", id),
            Route::LabDashboard => "/lab/dashboard".to_string(),
            Route::LabReportList => "/lab/reports".to_string(),
            Route::PendingTests => "/lab/pending-tests".to_string(),
            Route::CreateReport { batch_id } => format!("/lab/create-report/{}", batch_id),
            Route::LabReportDetail(id) => format!("/lab/reports/{}", id),
        }
    }

    /// Parse a client path (optionally with a query string).
    ///
    /// A `batch` query value that is not a number is dropped, so the intake
    /// screen opens on the scan step instead of failing.
    pub fn parse(path: &str) -> Option<Route> {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };
        let segments: Vec<&str> = path
            .trim_end_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let id = |s: &str| s.parse::<i64>().ok();

        let route = match segments.as_slice() {
            [] => Route::Home,
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["public", "batch", n] => Route::PublicBatch(id(n)?),
            ["manufacturer", "dashboard"] => Route::ManufacturerDashboard,
            ["manufacturer", "products"] => Route::ProductList,
            ["manufacturer", "products", "create"] => Route::CreateProduct,
            ["manufacturer", "products", n] => Route::ProductView(id(n)?),
            ["manufacturer", "batch", "create", n] => Route::CreateBatch {
                product_id: id(n)?,
            },
            ["manufacturer", "batches"] => Route::BatchList,
            ["transporter", "dashboard"] => Route::TransporterDashboard,
            ["transporter", "create"] => Route::CreateTransport {
                batch: query
                    .and_then(|q| query_param(q, "batch"))
                    .and_then(|v| id(&v)),
            },
            ["transporter", "transports"] => Route::TransportList,
            ["transporter", "transports", n] => Route::TransportDetail(id(n)?),
            ["lab", "dashboard"] => Route::LabDashboard,
            ["lab", "reports"] => Route::LabReportList,
            ["lab", "pending-tests"] => Route::PendingTests,
            ["lab", "create-report", n] => Route::CreateReport { batch_id: id(n)? },
            ["lab", "reports", n] => Route::LabReportDetail(id(n)?),
            _ => return None,
        };
        Some(route)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// First percent-decoded value of `key`. Pairs that do not decode as UTF-8
/// are skipped.
fn query_param(query: &str, key: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter_map(|(k, v)| {
            let name = urlencoding::decode(k).ok()?;
            let value = urlencoding::decode(v).ok()?;
            Some((name, value))
        })
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Outcome of opening a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted,
    RedirectToLogin,
    RedirectTo(String),
}

impl Access {
    pub fn into_result(self) -> Result<(), AccessDenied> {
        match self {
            Access::Granted => Ok(()),
            Access::RedirectToLogin => Err(AccessDenied {
                redirect: LOGIN_PATH.to_string(),
            }),
            Access::RedirectTo(redirect) => Err(AccessDenied { redirect }),
        }
    }
}

pub fn authorize(auth: Option<&AuthContext>, route: &Route) -> Access {
    let Some(required) = route.required_role() else {
        return Access::Granted;
    };
    match auth {
        None => Access::RedirectToLogin,
        Some(ctx) if ctx.role == required => Access::Granted,
        Some(ctx) => Access::RedirectTo(ctx.role.dashboard_path()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarEntry {
    pub label: &'static str,
    pub route: Route,
}

pub fn sidebar(role: Role) -> Vec<SidebarEntry> {
    let entry = |label, route| SidebarEntry { label, route };
    match role {
        Role::Manufacturer => vec![
            entry("Dashboard", Route::ManufacturerDashboard),
            entry("Create Product", Route::CreateProduct),
            entry("Products", Route::ProductList),
            entry("Batches", Route::BatchList),
        ],
        Role::Transporter => vec![
            entry("Dashboard", Route::TransporterDashboard),
            entry("My Transports", Route::TransportList),
            entry("Create Transport", Route::CreateTransport { batch: None }),
        ],
        Role::Lab => vec![
            entry("Dashboard", Route::LabDashboard),
            entry("My Reports", Route::LabReportList),
            entry("Pending Tests", Route::PendingTests),
        ],
        Role::Consumer => vec![],
    }
}

/// What a signed-in role can do next from a public batch page.
pub fn batch_follow_up(role: Role, batch_id: i64) -> Option<(&'static str, Route)> {
    match role {
        Role::Transporter => Some((
            "Update Transport",
            Route::CreateTransport {
                batch: Some(batch_id),
            },
        )),
        Role::Lab => Some(("Upload Lab Report", Route::CreateReport { batch_id })),
        Role::Manufacturer | Role::Consumer => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role) -> AuthContext {
        AuthContext::new(role, "t")
    }

    #[test]
    fn public_routes_need_no_auth() {
        assert_eq!(authorize(None, &Route::PublicBatch(3)), Access::Granted);
        assert_eq!(authorize(None, &Route::Login), Access::Granted);
    }

    #[test]
    fn anonymous_user_goes_to_login() {
        assert_eq!(
            authorize(None, &Route::TransportList),
            Access::RedirectToLogin
        );
        assert_eq!(
            authorize(None, &Route::TransportList).into_result(),
            Err(AccessDenied {
                redirect: "/login".to_string()
            })
        );
    }

    #[test]
    fn wrong_role_goes_to_own_dashboard() {
        let lab = ctx(Role::Lab);
        assert_eq!(
            authorize(Some(&lab), &Route::CreateTransport { batch: None }),
            Access::RedirectTo("/lab/dashboard".to_string())
        );
        let transporter = ctx(Role::Transporter);
        assert_eq!(
            authorize(Some(&transporter), &Route::CreateTransport { batch: Some(9) }),
            Access::Granted
        );
    }

    #[test]
    fn parse_round_trips_every_route() {
        let routes = [
            Route::Home,
            Route::Login,
            Route::Register,
            Route::PublicBatch(17),
            Route::ManufacturerDashboard,
            Route::ProductList,
            Route::CreateProduct,
            Route::ProductView(4),
            Route::CreateBatch { product_id: 4 },
            Route::BatchList,
            Route::TransporterDashboard,
            Route::CreateTransport { batch: None },
            Route::CreateTransport { batch: Some(9) },
            Route::TransportList,
            Route::TransportDetail(2),
            Route::LabDashboard,
            Route::LabReportList,
            Route::PendingTests,
            Route::CreateReport { batch_id: 8 },
            Route::LabReportDetail(1),
        ];
        for route in routes {
            assert_eq!(Route::parse(&route.path()), Some(route.clone()), "{route}");
        }
    }

    #[test]
    fn parse_navigation_parameter() {
        assert_eq!(
            Route::parse("/transporter/create?foo=1&batch=9"),
            Some(Route::CreateTransport { batch: Some(9) })
        );
        assert_eq!(
            Route::parse("/transporter/create?batch=abc"),
            Some(Route::CreateTransport { batch: None })
        );
        assert_eq!(
            Route::parse("/transporter/create?batch=%39"),
            Some(Route::CreateTransport { batch: Some(9) })
        );
        assert_eq!(
            Route::parse("/transporter/create?%62atch=1%37"),
            Some(Route::CreateTransport { batch: Some(17) })
        );
        assert_eq!(
            Route::parse("/transporter/create?batch=%FF"),
            Some(Route::CreateTransport { batch: None })
        );
        assert_eq!(Route::parse("/public/batch/x"), None);
        assert_eq!(Route::parse("/nowhere"), None);
    }

    #[test]
    fn sidebar_and_follow_up() {
        let entries = sidebar(Role::Transporter);
        assert_eq!(entries.len(), 3);
        assert!(entries
            .iter()
            .all(|e| authorize(Some(&ctx(Role::Transporter)), &e.route) == Access::Granted));
        assert!(sidebar(Role::Consumer).is_empty());

        assert_eq!(
            batch_follow_up(Role::Transporter, 5).map(|(_, r)| r.path()),
            Some("/transporter/create?batch=5".to_string())
        );
        assert!(batch_follow_up(Role::Consumer, 5).is_none());
    }
}
