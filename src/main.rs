//! specgate: resolves curated repository specs for the launch service.
//!
//! Reads a JSON request `{"spec": "...", "vars": {...}}`, or an array of
//! them, from stdin and writes one JSON result per request to stdout.
//!
//! Exit status: 0 when every request resolved, 1 when any was refused,
//! 2 when the input or configuration is unusable.

use std::io::Read;
use std::sync::Arc;

use log::error;
use serde::Deserialize;
use serde_json::{Value, json};

use specgate::config::Config;
use specgate::error::ResolveError;
use specgate::{Request, Resolution, Resolver, logging};

#[derive(Deserialize)]
#[serde(untagged)]
enum Input {
    One(Request),
    Many(Vec<Request>),
}

fn render(outcome: &Result<Resolution, ResolveError>) -> Value {
    match outcome {
        Ok(r) => json!({
            "ok": true,
            "provider": r.descriptor.provider_kind.token(),
            "spec": r.descriptor.resolved_spec,
            "repo_url": r.provider.repo_url(),
            "build_slug": r.provider.build_slug(),
            "mounts": serde_json::to_value(&r.mounts).unwrap_or_default(),
            "options": serde_json::to_value(&r.descriptor.options).unwrap_or_default(),
        }),
        Err(e) => json!({
            "ok": false,
            "error": e.kind(),
            "message": e.to_string(),
        }),
    }
}

fn main() {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("specgate: {e}");
            std::process::exit(2);
        }
    };
    logging::init(&config.settings.log_level);

    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        error!("failed to read stdin");
        std::process::exit(2);
    }

    let (requests, single) = match serde_json::from_str::<Input>(&input) {
        Ok(Input::One(r)) => (vec![r], true),
        Ok(Input::Many(rs)) => (rs, false),
        Err(e) => {
            error!("JSON parse error: {e}");
            std::process::exit(2);
        }
    };

    let resolver = Resolver::new(Arc::new(config));
    let outcomes = resolver.resolve_many(&requests);
    for (request, outcome) in requests.iter().zip(&outcomes) {
        logging::log_resolution(&request.spec, outcome);
    }

    let mut rendered: Vec<Value> = outcomes.iter().map(render).collect();
    let output = if single {
        rendered.pop().unwrap_or_default()
    } else {
        Value::Array(rendered)
    };
    println!("{output}");

    if outcomes.iter().any(Result::is_err) {
        std::process::exit(1);
    }
}
