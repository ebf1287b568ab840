use citrinemq::config::Config;
use std::env;
use std::io::Write;

#[test]
fn test_defaults_describe_a_single_node() {
    let config = Config::default();
    assert_eq!(config.cluster.self_host, "localhost:8000");
    assert!(config.cluster.nodes.is_empty());
    assert!(config.cluster.partitioning_enabled);
    assert_eq!(config.cluster.replication_factor, 2);
    assert_eq!(config.api_port(), 8000);
    assert!(!config.metrics.enabled);
}

#[test]
fn test_from_file_parses_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
host = "127.0.0.1"
database_path = "/tmp/test-node.db"

[cluster]
self_host = "localhost:8001"
nodes = ["localhost:8000", "localhost:8002"]
rpc_port = 50052
replication_factor = 3

[auth]
secret_key = "file-secret"

[metrics]
enabled = true
port = 9700
"#
    )
    .unwrap();

    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.api_port(), 8001);
    assert_eq!(config.cluster.nodes.len(), 2);
    assert_eq!(config.cluster.replication_factor, 3);
    assert_eq!(config.auth.secret_key, "file-secret");
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.port, 9700);
}

#[test]
fn test_rpc_address_resolution() {
    let mut config = Config::default();
    config
        .cluster
        .rpc_map
        .insert("localhost:8000".into(), "localhost:50051".into());

    // The configured table wins.
    assert_eq!(
        config.rpc_addr_for("localhost:8000").unwrap(),
        "localhost:50051"
    );
    // Unmapped addresses fall back to the fixed port offset.
    assert_eq!(
        config.rpc_addr_for("localhost:8001").unwrap(),
        "localhost:50052"
    );
    // Addresses whose offset port does not fit are rejected.
    assert!(config.rpc_addr_for("localhost:65000").is_none());
    assert!(config.rpc_addr_for("no-port-here").is_none());
}

#[test]
fn test_set_api_port_keeps_host() {
    let mut config = Config::default();
    config.set_api_port(9001);
    assert_eq!(config.cluster.self_host, "localhost:9001");
    assert_eq!(config.api_port(), 9001);
}

#[test]
fn test_replication_factor_zero_is_invalid() {
    let mut config = Config::default();
    config.cluster.replication_factor = 0;
    assert!(config.validate().is_err());
}

// Environment handling is covered by a single test: the variables are
// process-global and tests within this binary run concurrently.
#[test]
fn test_env_overrides() {
    unsafe {
        env::set_var("CLUSTER_NODES", "localhost:8001, localhost:8002 ,");
        env::set_var("SELF_HOST", "localhost:8000");
        env::set_var("GRPC_PORT", "50099");
        env::set_var("PARTITIONING_ENABLED", "FALSE");
        env::set_var("PARTITION_REPLICATION_FACTOR", "3");
        env::set_var("SECRET_KEY", "env-secret");
        env::set_var("ACCESS_TOKEN_EXPIRE_MINUTES", "15");
        env::set_var("DATABASE_URL", "sqlite:///var/lib/citrinemq/node.db");
    }

    let mut config = Config::default();
    config.apply_env_overrides().unwrap();

    assert_eq!(
        config.cluster.nodes,
        vec!["localhost:8001", "localhost:8002"]
    );
    assert_eq!(config.cluster.self_host, "localhost:8000");
    assert_eq!(config.cluster.rpc_port, 50099);
    assert!(!config.cluster.partitioning_enabled);
    assert_eq!(config.cluster.replication_factor, 3);
    assert_eq!(config.auth.secret_key, "env-secret");
    assert_eq!(config.auth.token_expire_minutes, 15);
    assert_eq!(config.database_path, "/var/lib/citrinemq/node.db");

    unsafe {
        for key in [
            "CLUSTER_NODES",
            "SELF_HOST",
            "GRPC_PORT",
            "PARTITIONING_ENABLED",
            "PARTITION_REPLICATION_FACTOR",
            "SECRET_KEY",
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            "DATABASE_URL",
        ] {
            env::remove_var(key);
        }
    }
}
