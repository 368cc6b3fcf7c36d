mod ui;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use keysmith::{
    Argon2Config, CredentialHash, CredentialHasher, HashConfig, OsRng, PasswordGenerator,
    PasswordPolicy, Scheme, DEFAULT_COST, DEFAULT_LENGTH,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "keysmith",
    version,
    about = "Random password generator with bcrypt/Argon2id hashing"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    generate: GenerateArgs,

    #[command(flatten)]
    hashing: HashArgs,

    /// Print only the password, hash or verification result
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Hash a password read from the terminal
    Hash,
    /// Check a password read from the terminal against a stored hash
    Verify {
        /// Encoded hash, e.g. $2b$12$...
        hash: String,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Password length
    #[arg(short, long, default_value_t = DEFAULT_LENGTH)]
    length: usize,

    /// Only generate the password, skip hashing
    #[arg(long)]
    no_hash: bool,

    /// Copy the password to the clipboard (OSC 52)
    #[arg(short, long)]
    copy: bool,

    /// Leave out look-alike characters such as l, 1, O and 0
    #[arg(long)]
    exclude_ambiguous: bool,
}

#[derive(Args)]
struct HashArgs {
    #[arg(long, value_enum, default_value = "bcrypt", global = true)]
    scheme: SchemeArg,

    /// bcrypt cost factor (4-31)
    #[arg(long, default_value_t = DEFAULT_COST, global = true)]
    cost: u32,

    #[arg(long, value_enum, default_value = "interactive", global = true)]
    argon2: Argon2Preset,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
enum SchemeArg {
    Bcrypt,
    Argon2id,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
enum Argon2Preset {
    Interactive,
    Standard,
    Paranoid,
}

impl HashArgs {
    fn config(&self) -> HashConfig {
        let argon2 = match self.argon2 {
            Argon2Preset::Interactive => Argon2Config::INTERACTIVE,
            Argon2Preset::Standard => Argon2Config::STANDARD,
            Argon2Preset::Paranoid => Argon2Config::PARANOID,
        };

        HashConfig {
            scheme: match self.scheme {
                SchemeArg::Bcrypt => Scheme::Bcrypt,
                SchemeArg::Argon2id => Scheme::Argon2id,
            },
            cost: self.cost,
            argon2,
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let options = ui::DisplayOptions {
        unicode_support: ui::detect_unicode_support(),
        color_support: ui::detect_color_support(),
        quiet: cli.quiet,
    };

    let hash_config = cli.hashing.config();

    match cli.command {
        None => generate(&cli.generate, hash_config, &options),
        Some(Command::Hash) => hash(hash_config, &options),
        Some(Command::Verify { hash: stored }) => {
            if !verify(&stored, &options)? {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn generate(
    args: &GenerateArgs,
    hash_config: HashConfig,
    options: &ui::DisplayOptions,
) -> Result<()> {
    let mut policy = PasswordPolicy::default();
    if args.exclude_ambiguous {
        policy = policy.without_ambiguous();
    }

    let mut generator = PasswordGenerator::with_policy(policy, OsRng)?;

    debug!(
        length = args.length,
        exclude_ambiguous = args.exclude_ambiguous,
        "generating password"
    );
    let password = generator.generate(args.length)?;

    let info = ui::PasswordInfo {
        length: password.len(),
        charset_size: generator.alphabet().len(),
        entropy: generator.entropy_bits(args.length),
        exclude_ambiguous: args.exclude_ambiguous,
    };
    ui::display_password(&password, &info, options);

    if args.copy {
        ui::copy_to_clipboard(&password)?;
        if !options.quiet {
            println!("\nCopied to clipboard.");
        }
    }

    if args.no_hash {
        return Ok(());
    }

    let mut hasher = CredentialHasher::with_config(hash_config)?;
    debug!(scheme = %hash_config.scheme, cost = hash_config.cost, "hashing generated password");

    let (hashed, elapsed) =
        ui::show_progress(options.unicode_support, "Hashing...", || hasher.hash(&password))
            .context("Failed to hash generated password")?;
    debug!(elapsed_ms = elapsed.as_millis() as u64, "password hashed");

    ui::display_hash(&hashed, hasher.config(), elapsed, options);

    if !options.quiet {
        let matches = hasher.verify(&password, &hashed)?;
        ui::display_verification(matches, options);
    }

    Ok(())
}

fn hash(hash_config: HashConfig, options: &ui::DisplayOptions) -> Result<()> {
    let mut hasher = CredentialHasher::with_config(hash_config)?;
    let password = ui::prompt_secret("Password: ", "Password")?;

    debug!(scheme = %hash_config.scheme, cost = hash_config.cost, "hashing entered password");
    let (hashed, elapsed) =
        ui::show_progress(options.unicode_support, "Hashing...", || hasher.hash(&password))?;

    ui::display_hash(&hashed, hasher.config(), elapsed, options);
    Ok(())
}

fn verify(stored: &str, options: &ui::DisplayOptions) -> Result<bool> {
    let stored = CredentialHash::parse(stored.trim()).context("Stored hash is not usable")?;
    debug!(scheme = %stored.scheme(), "verifying against stored hash");

    let password = ui::prompt_secret("Password: ", "Password")?;

    let (matches, elapsed) =
        ui::show_progress(options.unicode_support, "Verifying...", || stored.verify(&password))?;
    debug!(matches, elapsed_ms = elapsed.as_millis() as u64, "verification finished");

    ui::display_verification(matches, options);
    Ok(matches)
}
