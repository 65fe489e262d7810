//! Loads the sample configs shipped in `configs/`.

use autoprobe::{Config, Params};
use std::path::PathBuf;

fn sample(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("configs")
        .join(name)
}

#[test]
fn shop_config_needs_a_password() {
    let err = Config::load(sample("shop.yaml")).unwrap_err();
    assert!(err.to_string().contains("password"));
}

#[test]
fn shop_config_loads_with_params() {
    let params = Params::from_args(&["password=s3cret".into(), "host=shop.test:8080".into()]).unwrap();
    let config = Config::load_with_params(sample("shop.yaml"), &params).unwrap();

    assert_eq!(config.name, "shop");
    assert_eq!(config.base_url, "http://shop.test:8080/");

    let crawl = config.crawl_options();
    assert_eq!(crawl.max_pages, 40);
    assert_eq!(crawl.auth_routes, vec!["/account", "/account/orders"]);
    assert!(crawl.screenshot_dir.is_some());

    let run = config.run_options();
    assert_eq!(run.retry_delay_ms, 500);
    assert_eq!(run.resolver.default_timeout_ms, 8000);
    assert_eq!(run.values.resolve("{{password}}/{{zip}}"), "s3cret/10001");
    assert_eq!(
        config.runs_dir(),
        PathBuf::from("./autoprobe-output/shop").join("runs")
    );
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("absent.yaml"));
}

#[test]
fn config_written_to_disk_round_trips_params() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.yaml");
    std::fs::write(
        &path,
        "name: app\nparams:\n  port: { default: '4000' }\nbase_url: http://127.0.0.1:${port}\n",
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.base_url, "http://127.0.0.1:4000");
    let overridden = Config::load_with_params(&path, &Params::new().set("port", "5000")).unwrap();
    assert_eq!(overridden.base_url, "http://127.0.0.1:5000");
}
