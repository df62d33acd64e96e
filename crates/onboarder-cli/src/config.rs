//! Configuration from the config file overridden by global CLI flags.
use clap::{
    arg,
    builder::{PossibleValuesParser, TypedValueParser},
    value_parser, Arg, ArgMatches,
};
use onboarder_core::config::{load_config, ConfigError, OnboarderConfig, Protocol};

/// Global flags selecting the service and the local stores.
pub fn global_args() -> Vec<Arg> {
    vec![
        arg!(--protocol <PROTOCOL> "Service URL scheme")
            .value_parser(
                PossibleValuesParser::new(["http", "https"]).try_map(|s| s.parse::<Protocol>()),
            )
            .global(true),
        arg!(--host <HOST> "Service host").global(true),
        arg!(--port <PORT> "Service port, used when the host is localhost")
            .value_parser(value_parser!(u16))
            .global(true),
        arg!(--vault <DIR> "Directory holding key material").global(true),
        arg!(--storage <DIR> "Directory holding DIDs, tokens and documents").global(true),
    ]
}

/// Loads the config file named by `ONBOARDER_CONFIG` and applies flag overrides.
pub fn cli_config(matches: &ArgMatches) -> Result<OnboarderConfig, ConfigError> {
    let mut config = load_config()?;
    apply_overrides(&mut config, matches);
    Ok(config)
}

fn apply_overrides(config: &mut OnboarderConfig, matches: &ArgMatches) {
    if let Some(protocol) = matches.get_one::<Protocol>("protocol") {
        config.service.protocol = *protocol;
    }
    if let Some(host) = matches.get_one::<String>("host") {
        config.service.host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.service.port = *port;
    }
    if let Some(vault) = matches.get_one::<String>("vault") {
        config.vault_dir = vault.clone();
    }
    if let Some(storage) = matches.get_one::<String>("storage") {
        config.storage_dir = storage.clone();
    }
}
