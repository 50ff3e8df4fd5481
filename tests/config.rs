// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, env var interpolation, defaults and file discovery.

use pullwarden::config::*;
use pullwarden::error::Error;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.registries.vendor_domain, "cgr.dev");
        assert_eq!(config.registries.mirror_host, "mirror.gcr.io");
        assert_eq!(config.tokens.refresh_interval, Duration::from_secs(3600));
        assert_eq!(config.tokens.proactive_threshold, Duration::from_secs(900));
        assert_eq!(config.tokens.failure_cooldown, Duration::from_secs(300));
        assert_eq!(config.verification.cache_capacity, 1000);
        assert_eq!(config.remote.max_retries, 3);
        assert_eq!(config.remote.concurrency, 2);
        assert_eq!(config.timeouts.pull, Duration::from_secs(600));
        assert_eq!(config.tools.runtime, "docker");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let yaml = r#"
registries:
  vendor_domain: " Registry.Example.COM "
  cloud_hosts: [gcr.io]
tokens:
  refresh_interval: 30m
  proactive_threshold: 5m
tools:
  runtime: podman
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.registries.vendor_domain, "registry.example.com");
        assert_eq!(config.registries.cloud_hosts, vec!["gcr.io".to_string()]);
        assert_eq!(config.registries.private_org, "chainguard-private");
        assert_eq!(config.tokens.refresh_interval, Duration::from_secs(1800));
        assert_eq!(config.tools.runtime, "podman");
        assert_eq!(config.tools.tag_lister, "skopeo");
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        assert!(matches!(
            Config::from_yaml("servers: []"),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn empty_host_is_rejected() {
        let yaml = r#"
registries:
  mirror_sources: ["docker.io", "  "]
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }
}

mod validation {
    use super::*;

    #[test]
    fn zero_cache_capacity() {
        let err = Config::from_yaml("verification:\n  cache_capacity: 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn zero_flush_interval() {
        let err = Config::from_yaml("checkpoint:\n  flush_every: 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn threshold_longer_than_interval() {
        let yaml = "tokens:\n  refresh_interval: 10m\n  proactive_threshold: 20m\n";
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("proactive_threshold"));
    }
}

mod registries {
    use super::*;

    #[test]
    fn host_families() {
        let r = RegistriesConfig::default();
        assert!(r.is_vendor_host("cgr.dev"));
        assert!(r.is_cloud_host("gcr.io"));
        assert!(r.is_cloud_host("europe-west1-docker.pkg.dev"));
        assert!(!r.is_cloud_host("mirror.gcr.io"));
        assert!(!r.is_cloud_host("quay.io"));
    }

    #[test]
    fn cloud_logins_include_artifact_suffix() {
        let r = RegistriesConfig::default();
        assert_eq!(
            r.cloud_login_hosts(),
            vec!["gcr.io", "us.gcr.io", "eu.gcr.io", "asia.gcr.io", "pkg.dev"]
        );
    }
}

mod env_vars {
    use super::*;

    #[test]
    fn metadata_token_reads_environment() {
        temp_env::with_var("GITHUB_TOKEN", Some("ghp_test"), || {
            let config = Config::default();
            assert_eq!(
                config.verification.metadata_token.resolve_optional(),
                Some("ghp_test".to_string())
            );
        });
    }

    #[test]
    fn missing_metadata_token_is_optional() {
        temp_env::with_var_unset("GITHUB_TOKEN", || {
            let config = Config::default();
            assert!(config.verification.metadata_token.resolve_optional().is_none());
            assert!(matches!(
                config.verification.metadata_token.resolve(),
                Err(Error::MissingEnvVar(_))
            ));
        });
    }

    #[test]
    fn env_reference_with_default() {
        let yaml = r#"
verification:
  metadata_token:
    env: PULLWARDEN_UNSET_TOKEN
    default: fallback
"#;
        temp_env::with_var_unset("PULLWARDEN_UNSET_TOKEN", || {
            let config = Config::from_yaml(yaml).unwrap();
            assert_eq!(config.verification.metadata_token.resolve().unwrap(), "fallback");
        });
    }

    #[test]
    fn literal_token() {
        let yaml = "verification:\n  metadata_token: ghp_literal\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(
            config.verification.metadata_token,
            EnvValue::Literal("ghp_literal".to_string())
        );
    }
}

mod discovery {
    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::find(dir.path()).is_none());
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.checkpoint.flush_every, 25);
    }

    #[test]
    fn finds_yaml_extension_and_dot_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".pullwarden")).unwrap();
        std::fs::write(
            dir.path().join(".pullwarden/config.yml"),
            "tools:\n  runtime: podman\n",
        )
        .unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap().tools.runtime, "podman");

        std::fs::write(dir.path().join("pullwarden.yaml"), "tools:\n  runtime: nerdctl\n").unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap().tools.runtime, "nerdctl");
    }

    #[test]
    fn init_writes_a_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_config(dir.path(), false).unwrap();
        assert_eq!(path, dir.path().join("pullwarden.yml"));
        let config = Config::load(&path).unwrap();
        assert_eq!(config.remote.base_url, "https://console-api.enforce.dev");
    }
}
