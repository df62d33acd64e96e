//! Onboarder CLI binary
use anyhow::{anyhow, Context};
use clap::{
    arg,
    builder::{PossibleValuesParser, TypedValueParser},
    crate_version, value_parser, Arg, ArgAction, ArgMatches, Command,
};
use onboarder_api::{
    api::{
        OnboarderContext, OnboarderDIDAPI, OnboarderInfoAPI, OnboarderKeyAPI, OnboarderVCAPI,
        OnboarderVPAPI, Outcome, VcIssuance, VpIssuance,
    },
    http_client::ReqwestClient,
    OnboarderAPI,
};
use onboarder_cli::{
    config::{cli_config, global_args},
    Reporter,
};
use onboarder_core::{jwk::KeyAlgorithm, request::DidMethod};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

fn out_arg() -> Arg {
    arg!(--out <FILE> "Save the result under this name")
        .value_parser(value_parser!(PathBuf))
        .required(false)
}

fn key_arg() -> Arg {
    arg!(--key <FILE> "Key file in the vault")
        .value_parser(value_parser!(PathBuf))
        .required(true)
}

fn cli() -> Command {
    Command::new("Onboarder CLI")
        .about(format!("Onboarder CLI v{}\n\nCommand line client for the DID, VC and VP lifecycle of an onboarding service.", crate_version!()))
        .version(crate_version!())
        .author(env!("CARGO_PKG_AUTHORS"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args(global_args())
        .arg(
            arg!(-v --verbose "Print each request before it is sent")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            arg!(-q --quiet "Print nothing on success")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose")
                .global(true),
        )
        .arg(
            arg!(-s --suppress "Do not print the service response")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("fetch")
                .about("Service information.")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("info")
                        .about("Fetches service information.")
                        .arg(out_arg()),
                ),
        )
        .subcommand(
            Command::new("create")
                .about("Key and DID creation.")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("key")
                        .about("Creates a key, saved to the vault.")
                        .arg(
                            arg!(--alg <ALG> "Key algorithm")
                                .value_parser(
                                    PossibleValuesParser::new(["rsa", "secp256k1"])
                                        .try_map(|s| s.parse::<KeyAlgorithm>()),
                                )
                                .required(true),
                        )
                        .arg(out_arg()),
                )
                .subcommand(
                    Command::new("did")
                        .about("Creates a DID from the public part of a vault key.")
                        .arg(key_arg())
                        .arg(
                            arg!(--method <METHOD> "DID method")
                                .value_parser(
                                    PossibleValuesParser::new(["key", "ebsi"])
                                        .try_map(|s| s.parse::<DidMethod>()),
                                )
                                .required(true),
                        )
                        .arg(out_arg()),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolves a DID.")
                .arg(arg!(<DID> "DID to resolve"))
                .arg(out_arg()),
        )
        .subcommand(
            Command::new("issue")
                .about("Credential and presentation issuance.")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("vc")
                        .about("Issues a verifiable credential.")
                        .arg(key_arg())
                        .arg(arg!(--kid <KID> "Key identifier").required(true))
                        .arg(arg!(--issuer <DID> "Issuer DID").required(true))
                        .arg(arg!(--subject <DID> "Subject DID").required(true))
                        .arg(
                            Arg::new("claims_json")
                                .long("claims-json")
                                .value_name("FILE")
                                .help("JSON file holding a claims object")
                                .value_parser(value_parser!(PathBuf)),
                        )
                        .arg(
                            Arg::new("claims")
                                .long("claims")
                                .value_name("KEY=VALUE")
                                .help("Ad-hoc claims, overriding the claims file")
                                .num_args(1..)
                                .action(ArgAction::Append),
                        )
                        .arg(out_arg()),
                )
                .subcommand(
                    Command::new("vp")
                        .about("Issues a verifiable presentation.")
                        .arg(key_arg())
                        .arg(arg!(--kid <KID> "Key identifier").required(true))
                        .arg(arg!(--signer <DID> "Signer DID").required(true))
                        .arg(arg!(--holder <DID> "Holder DID").required(true))
                        .arg(arg!(--audience <DID> "Audience DID").required(true))
                        .arg(
                            arg!(--credentials <FILE> "Credential token files, in order")
                                .value_parser(value_parser!(PathBuf))
                                .num_args(1..)
                                .required(true),
                        )
                        .arg(out_arg()),
                ),
        )
        .subcommand(
            Command::new("verify")
                .about("Credential and presentation verification.")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("vc")
                        .about("Verifies a verifiable credential.")
                        .arg(arg!(<FILE> "Token file in the store").value_parser(value_parser!(PathBuf)))
                        .arg(out_arg()),
                )
                .subcommand(
                    Command::new("vp")
                        .about("Verifies a verifiable presentation.")
                        .arg(arg!(<FILE> "Token file in the store").value_parser(value_parser!(PathBuf)))
                        .arg(arg!(--audience <DID> "Audience DID").required(true))
                        .arg(out_arg()),
                ),
        )
}

/// Status line label of the selected operation.
fn operation_label(matches: &ArgMatches) -> &'static str {
    match matches.subcommand() {
        Some(("fetch", _)) => "Fetching service info",
        Some(("create", sub_matches)) => match sub_matches.subcommand_name() {
            Some("key") => "Creating key",
            _ => "Creating DID",
        },
        Some(("resolve", _)) => "Resolving DID",
        Some(("issue", sub_matches)) => match sub_matches.subcommand_name() {
            Some("vp") => "Issuing VP",
            _ => "Issuing VC",
        },
        Some(("verify", sub_matches)) => match sub_matches.subcommand_name() {
            Some("vp") => "Verifying VP",
            _ => "Verifying VC",
        },
        _ => "Running command",
    }
}

fn required<'a, T>(matches: &'a ArgMatches, id: &str) -> anyhow::Result<&'a T>
where
    T: Clone + Send + Sync + 'static,
{
    matches
        .get_one::<T>(id)
        .ok_or_else(|| anyhow!("Missing argument: {id}"))
}

fn string(matches: &ArgMatches, id: &str) -> anyhow::Result<String> {
    required::<String>(matches, id).cloned()
}

fn out(matches: &ArgMatches) -> Option<&Path> {
    matches.get_one::<PathBuf>("out").map(PathBuf::as_path)
}

fn vc_issuance(matches: &ArgMatches) -> anyhow::Result<VcIssuance> {
    Ok(VcIssuance {
        key: required::<PathBuf>(matches, "key")?.clone(),
        kid: string(matches, "kid")?,
        issuer: string(matches, "issuer")?,
        subject: string(matches, "subject")?,
        claims_json: matches.get_one::<PathBuf>("claims_json").cloned(),
        claims: matches
            .get_many::<String>("claims")
            .map(|claims| claims.cloned().collect())
            .unwrap_or_default(),
    })
}

fn vp_issuance(matches: &ArgMatches) -> anyhow::Result<VpIssuance> {
    Ok(VpIssuance {
        key: required::<PathBuf>(matches, "key")?.clone(),
        kid: string(matches, "kid")?,
        signer: string(matches, "signer")?,
        holder: string(matches, "holder")?,
        audience: string(matches, "audience")?,
        credentials: matches
            .get_many::<PathBuf>("credentials")
            .map(|files| files.cloned().collect())
            .unwrap_or_default(),
    })
}

async fn execute(matches: &ArgMatches, reporter: &Reporter) -> anyhow::Result<Outcome> {
    let config = cli_config(matches).context("Failed to load configuration")?;
    debug!("Service address: {}", config.service);
    let ctx = OnboarderContext::new(&config, Box::new(ReqwestClient::default()))?
        .verbose(reporter.is_verbose());

    let outcome = match matches.subcommand() {
        Some(("fetch", sub_matches)) => match sub_matches.subcommand() {
            Some(("info", sub_matches)) => {
                OnboarderAPI::fetch_info(&ctx, out(sub_matches)).await?
            }
            _ => return Err(anyhow!("Unknown fetch command")),
        },
        Some(("create", sub_matches)) => match sub_matches.subcommand() {
            Some(("key", sub_matches)) => {
                let alg = required::<KeyAlgorithm>(sub_matches, "alg")?;
                OnboarderAPI::create_key(&ctx, *alg, out(sub_matches)).await?
            }
            Some(("did", sub_matches)) => {
                let key = required::<PathBuf>(sub_matches, "key")?;
                let method = required::<DidMethod>(sub_matches, "method")?;
                OnboarderAPI::create_did(&ctx, key, *method, out(sub_matches)).await?
            }
            _ => return Err(anyhow!("Unknown create command")),
        },
        Some(("resolve", sub_matches)) => {
            let did = required::<String>(sub_matches, "DID")?;
            OnboarderAPI::resolve_did(&ctx, did, out(sub_matches)).await?
        }
        Some(("issue", sub_matches)) => match sub_matches.subcommand() {
            Some(("vc", sub_matches)) => {
                let issuance = vc_issuance(sub_matches)?;
                OnboarderAPI::issue_vc(&ctx, &issuance, out(sub_matches)).await?
            }
            Some(("vp", sub_matches)) => {
                let issuance = vp_issuance(sub_matches)?;
                OnboarderAPI::issue_vp(&ctx, &issuance, out(sub_matches)).await?
            }
            _ => return Err(anyhow!("Unknown issue command")),
        },
        Some(("verify", sub_matches)) => match sub_matches.subcommand() {
            Some(("vc", sub_matches)) => {
                let file = required::<PathBuf>(sub_matches, "FILE")?;
                OnboarderAPI::verify_vc(&ctx, file, out(sub_matches)).await?
            }
            Some(("vp", sub_matches)) => {
                let file = required::<PathBuf>(sub_matches, "FILE")?;
                let audience = required::<String>(sub_matches, "audience")?;
                OnboarderAPI::verify_vp(&ctx, file, audience, out(sub_matches)).await?
            }
            _ => return Err(anyhow!("Unknown verify command")),
        },
        _ => return Err(anyhow!("Unknown command")),
    };
    Ok(outcome)
}

fn init_tracing(reporter: &Reporter) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(reporter.log_filter()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
        .try_init()?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    let reporter = Reporter::from_matches(&matches);
    if let Err(err) = init_tracing(&reporter) {
        eprintln!("Failed to initialise logging: {err}");
    }

    let operation = operation_label(&matches);
    match execute(&matches, &reporter).await {
        Ok(outcome) => {
            reporter.report_success(operation, &outcome);
            ExitCode::SUCCESS
        }
        Err(err) => {
            reporter.report_failure(operation, &err);
            ExitCode::FAILURE
        }
    }
}
