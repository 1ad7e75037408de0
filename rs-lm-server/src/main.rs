mod config;

use std::collections::BTreeMap;
use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, middleware::Logger, put, web};
use env_logger::Env;
use log::{error, info, warn};
use serde::Deserialize;

use rs_lm_core::io::list_files;
use rs_lm_core::model::{LanguageModel, Sampler, evaluate};

use crate::config::ServerConfig;

const DEFAULT_MAX_TOKENS: usize = 30;

/// Query parameters of the `/v1/generate` endpoint
#[derive(Deserialize)]
struct GenerateParams {
	model: Option<String>,
	max_tokens: Option<usize>,
	seed: Option<u64>,
}

/// Query parameters of the `/v1/perplexity` endpoint
#[derive(Deserialize)]
struct PerplexityParams {
	model: Option<String>,
	sentence: Option<String>,
}

#[derive(Deserialize)]
struct ModelQuery {
	names: Option<String>,
}

/// Models currently served, by name.
#[derive(Default)]
struct SharedData {
	models: BTreeMap<String, LanguageModel>,
}

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, HttpResponse> {
	match value {
		Some(s) if !s.trim().is_empty() => Ok(s.trim()),
		_ => Err(HttpResponse::BadRequest().body(format!("Missing or empty {what}"))),
	}
}

/// HTTP GET endpoint `/v1/perplexity`
///
/// Scores a sentence against one loaded model and returns the JSON report
/// (per-token scores, cross-entropy and perplexity).
///
/// # Notes
/// - The metrics of a sentence with an unknown word are infinite and are
///   serialized as `null`; `PerplexityReport` reads them back as infinity.
#[get("/v1/perplexity")]
async fn get_perplexity(data: web::Data<Mutex<SharedData>>, query: web::Query<PerplexityParams>) -> impl Responder {
	let name = match required(&query.model, "model name") {
		Ok(name) => name,
		Err(response) => return response,
	};
	let sentence = query.sentence.as_deref().unwrap_or_default();

	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	match shared_data.models.get(name) {
		Some(model) => HttpResponse::Ok().json(evaluate(sentence, model)),
		None => HttpResponse::NotFound().body(format!("Model {name} is not loaded")),
	}
}

/// HTTP GET endpoint `/v1/generate`
///
/// Samples one sentence from a loaded model. A `seed` makes the output
/// reproducible.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<Mutex<SharedData>>, query: web::Query<GenerateParams>) -> impl Responder {
	let name = match required(&query.model, "model name") {
		Ok(name) => name,
		Err(response) => return response,
	};
	let max_tokens = query.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
	if max_tokens == 0 {
		return HttpResponse::BadRequest().body("max_tokens must be at least 1");
	}

	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	let Some(model) = shared_data.models.get(name) else {
		return HttpResponse::NotFound().body(format!("Model {name} is not loaded"));
	};

	let mut sampler = match query.seed {
		Some(seed) => Sampler::with_seed(model, seed),
		None => Sampler::new(model),
	};
	match sampler.sample_sentence(max_tokens) {
		Ok(sentence) => HttpResponse::Ok().body(sentence),
		Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
	}
}

#[get("/v1/models")]
async fn get_models(config: web::Data<ServerConfig>) -> impl Responder {
	match list_files(&config.data_dir, "arpa") {
		Ok(files) => {
			let names: Vec<&str> = files.iter().filter_map(|f| f.strip_suffix(".arpa")).collect();
			HttpResponse::Ok().body(names.join("\n"))
		}
		Err(e) => {
			error!("{e}");
			HttpResponse::InternalServerError().body("Failed to list models")
		}
	}
}

#[get("/v1/loaded_models")]
async fn get_loaded_models(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	let names: Vec<&str> = shared_data.models.keys().map(String::as_str).collect();
	HttpResponse::Ok().body(names.join("\n"))
}

/// HTTP PUT endpoint `/v1/load_models?names=a,b`
///
/// Replaces the served models with the named ones. Nothing changes unless
/// every model loads.
#[put("/v1/load_models")]
async fn put_model(
	data: web::Data<Mutex<SharedData>>,
	config: web::Data<ServerConfig>,
	query: web::Query<ModelQuery>,
) -> impl Responder {
	let query_names = match required(&query.names, "model name") {
		Ok(names) => names,
		Err(response) => return response,
	};

	let model_names: Vec<&str> = query_names
		.split(',')
		.map(|s| s.trim())
		.filter(|s| !s.is_empty())
		.collect();

	let mut models = BTreeMap::new();
	for name in model_names {
		let Some(model_path) = config.model_path(name) else {
			return HttpResponse::BadRequest().body(format!("Invalid model name {name}"));
		};
		match LanguageModel::load_cached(&model_path) {
			Ok(model) => {
				models.insert(name.to_owned(), model);
			}
			Err(e) => {
				warn!("Failed to load model {name}: {e}");
				return HttpResponse::InternalServerError().body(format!("Failed to load model: {e}"));
			}
		}
	}

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	shared_data.models = models;
	info!("Serving models: {:?}", shared_data.models.keys().collect::<Vec<_>>());

	HttpResponse::Ok().body("Models loaded successfully")
}

fn routes(cfg: &mut web::ServiceConfig) {
	cfg.service(get_perplexity)
		.service(get_generated)
		.service(get_models)
		.service(put_model)
		.service(get_loaded_models);
}

/// Main entry point for the server.
///
/// Reads the configuration from the environment, starts with no model
/// loaded and serves the `/v1` endpoints.
///
/// # Notes
/// - `RS_LM_BIND` sets the listening address (default 127.0.0.1:5000).
/// - `RS_LM_DATA_DIR` sets the model folder (default ./data).
/// - `RUST_LOG` sets the log filter (default info).
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(Env::default().default_filter_or("info"))
		.format_timestamp_millis()
		.init();

	let config = ServerConfig::from_env().map_err(std::io::Error::other)?;
	info!("Serving models from {} on {}", config.data_dir.display(), config.bind);

	let bind = config.bind;
	let shared_config = web::Data::new(config);
	let shared_model = web::Data::new(Mutex::new(SharedData::default()));

	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.wrap(Logger::default())
			.app_data(shared_model.clone())
			.app_data(shared_config.clone())
			.configure(routes)
	})
		.bind(bind)?
		.run()
		.await
}
