//! Backend base-URL resolution from the deployment host name.
//!
//! The product ships in three shapes: co-located with the backend
//! (one origin serves both), as a static frontend on separate hosting,
//! and in local development. Which backend to talk to follows from the
//! host name alone.

/// Backend origin used when the frontend is served from static hosting.
pub const HOSTED_BACKEND_ORIGIN: &str = "https://gaitview-api.azurewebsites.net";

/// Fallback backend origin for local development.
pub const LOCAL_BACKEND_ORIGIN: &str = "http://localhost:8000";

/// Host suffix of co-located deployments (frontend and backend share
/// an origin).
const CO_LOCATED_SUFFIX: &str = ".azurewebsites.net";

/// Host suffix of the separately hosted static frontend.
const STATIC_FRONTEND_SUFFIX: &str = ".github.io";

/// Resolve the backend base URL for a given host name.
///
/// Rules, first match wins:
/// 1. co-located hosts (`localhost`, `127.0.0.1`, `*.azurewebsites.net`)
///    resolve to the empty string, meaning "same origin, relative
///    paths";
/// 2. the static-hosted frontend (`*.github.io`) resolves to the fixed
///    hosted backend origin;
/// 3. anything else is local development: `dev_override` if set,
///    otherwise the literal local origin.
///
/// Pure and total; never fails, no side effects beyond a debug log.
pub fn resolve_base_url(host: &str, dev_override: Option<&str>) -> String {
    let resolved = if host == "localhost" || host == "127.0.0.1" || host.ends_with(CO_LOCATED_SUFFIX)
    {
        String::new()
    } else if host.ends_with(STATIC_FRONTEND_SUFFIX) {
        HOSTED_BACKEND_ORIGIN.to_string()
    } else {
        dev_override.unwrap_or(LOCAL_BACKEND_ORIGIN).to_string()
    };

    tracing::debug!(host, base_url = %resolved, "Resolved backend base URL");
    resolved
}
