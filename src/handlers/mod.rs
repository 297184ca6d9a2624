//! The fixed benchmark-facing HTTP surface mounted identically on every
//! pipeline (`spec.md` §6's external interface table).

use crate::http::{response, Handled, Method, Request, Response, StatusCode};
use crate::routing::Router;
use std::time::{SystemTime, UNIX_EPOCH};

/// Registers `/health`, `/hello`, `/cpu-intensive`, `/io-simulation`, and
/// `/status` on `router`, tagging JSON bodies with `server_name` the way
/// each pipeline identifies itself in benchmark output.
pub fn mount(router: &mut Router, server_name: &'static str) {
    router
        .get("/health", move |req: &Request, resp: &mut Response| health(server_name, req, resp))
        .post("/health", move |req: &Request, resp: &mut Response| health(server_name, req, resp))
        .head("/health", move |_: &Request, resp: &mut Response| {
            resp.status(StatusCode::Ok).header("content-type", "application/json").body(Vec::new())
        })
        .get("/hello", move |_: &Request, resp: &mut Response| {
            response::text(format!("Hello from {}", display_name(server_name)), resp)
        })
        .get("/cpu-intensive", move |_: &Request, resp: &mut Response| cpu_intensive(server_name, resp))
        .get("/io-simulation", move |_: &Request, resp: &mut Response| io_simulation(server_name, resp))
        .get("/status", move |_: &Request, resp: &mut Response| status(server_name, resp));
}

fn health(server_name: &'static str, req: &Request, resp: &mut Response) -> Handled {
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    let thread = std::thread::current().name().unwrap_or("unknown").to_string();
    let method_label = if req.method() == Method::Post { "post" } else { "get" };
    let body = serde_json::json!({
        "status": "healthy",
        "server": server_name,
        "timestamp": timestamp,
        "thread": thread,
        "via": method_label,
    });
    response::json(body.to_string(), resp)
}

/// Capitalizes `server_name` (e.g. `"threaded"` -> `"Threaded"`) and
/// appends `" Server"`, matching the `/hello` body's display form
/// (`spec.md` §8, S1).
fn display_name(server_name: &str) -> String {
    let mut chars = server_name.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };
    format!("{capitalized} Server")
}

/// ~100k-iteration compute to stand in for CPU-bound handler work
/// (`spec.md` §6).
fn cpu_intensive(server_name: &'static str, resp: &mut Response) -> Handled {
    let mut acc: u64 = 0;
    for i in 0..100_000u64 {
        acc = acc.wrapping_add(i.wrapping_mul(i));
    }
    let body = serde_json::json!({ "server": server_name, "result": acc });
    response::json(body.to_string(), resp)
}

/// ≈100 ms simulated I/O (`spec.md` §6). Blocking sleep: Threaded and
/// Hybrid run this handler on a worker thread where blocking is fine;
/// EventLoop's registration of this route wraps it in `execute_async`
/// so the reactor thread is never the one sleeping.
fn io_simulation(server_name: &'static str, resp: &mut Response) -> Handled {
    std::thread::sleep(std::time::Duration::from_millis(100));
    let body = serde_json::json!({ "server": server_name, "io": "completed" });
    response::json(body.to_string(), resp)
}

fn status(server_name: &'static str, resp: &mut Response) -> Handled {
    let body = serde_json::json!({
        "server": server_name,
        "status": "running",
        "pid": std::process::id(),
    });
    response::json(body.to_string(), resp)
}
