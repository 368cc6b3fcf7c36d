use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use console::{Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use keysmith::{CredentialHash, HashConfig, Scheme};
use std::io;
use std::time::{Duration, Instant};
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

pub const MIN_SAFE_ENTROPY: f64 = 100.0;
pub const PARANOID_ENTROPY: f64 = 300.0;

pub const MIN_SAFE_PASSWORD_LENGTH: usize = 16;
pub const MIN_SAFE_BCRYPT_COST: u32 = 10;

pub const MAX_SECRET_BYTES: usize = 4096;

pub struct PasswordInfo {
    pub length: usize,
    pub charset_size: usize,
    pub entropy: f64,
    pub exclude_ambiguous: bool,
}

pub struct DisplayOptions {
    pub unicode_support: bool,
    pub color_support: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Weak,
    Strong,
    Paranoid,
}

impl Strength {
    pub fn rate(entropy: f64) -> Self {
        if entropy >= PARANOID_ENTROPY {
            Self::Paranoid
        } else if entropy >= MIN_SAFE_ENTROPY {
            Self::Strong
        } else {
            Self::Weak
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Weak => "Weak",
            Self::Strong => "Strong",
            Self::Paranoid => "Paranoid",
        }
    }
}

pub fn detect_unicode_support() -> bool {
    supports_unicode::on(supports_unicode::Stream::Stdout)
}

pub fn detect_color_support() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

pub fn get_status_symbols(unicode_support: bool) -> (&'static str, &'static str) {
    if unicode_support {
        ("✓", "!")
    } else {
        ("+", "!")
    }
}

fn status_style(secure: bool, options: &DisplayOptions) -> Style {
    if !options.color_support {
        Style::new()
    } else if secure {
        Style::new().green()
    } else {
        Style::new().yellow()
    }
}

fn tree_glyphs(unicode_support: bool) -> (&'static str, &'static str) {
    if unicode_support {
        ("├─", "└─")
    } else {
        ("|-", "`-")
    }
}

fn plural(count: usize, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 { one } else { many }
}

fn validate_control_characters(
    s: Zeroizing<String>,
    input_name: &str,
) -> Result<Zeroizing<String>> {
    let control_chars: Vec<(usize, char)> = s
        .chars()
        .enumerate()
        .filter(|(_, c)| c.is_control())
        .collect();

    if !control_chars.is_empty() {
        let term = Term::stderr();

        let warning_msg = format!(
            "WARNING: {} contains {} control character(s) at position(s): {}",
            input_name,
            control_chars.len(),
            control_chars
                .iter()
                .map(|(pos, _)| pos.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        term.write_line(&warning_msg)?;
        term.write_str("Continue anyway? [y/N]: ")?;
        term.flush()?;

        let mut response = String::new();
        io::stdin().read_line(&mut response)?;
        let response = response.trim().to_lowercase();

        term.clear_last_lines(2)?;

        if response != "y" && response != "yes" {
            anyhow::bail!("Aborted");
        }
    }

    Ok(s)
}

/// NFC output is at most three times the input length, so the buffer never
/// reallocates and leaves no unwiped copies behind.
fn normalize_and_validate(s: &str, input_name: &str) -> Result<Zeroizing<String>> {
    let trimmed = s.trim();
    let mut normalized = Zeroizing::new(String::with_capacity(trimmed.len() * 3));
    normalized.extend(trimmed.nfc());
    validate_control_characters(normalized, input_name)
}

/// Reads a secret without echo and normalises it to NFC so that visually
/// identical input hashes identically.
pub fn prompt_secret(prompt: &str, input_name: &str) -> Result<Zeroizing<String>> {
    let raw = Zeroizing::new(
        rpassword::prompt_password(prompt)
            .with_context(|| format!("Failed to read {}", input_name.to_lowercase()))?,
    );

    if raw.is_empty() {
        anyhow::bail!("{} cannot be empty", input_name);
    }

    let normalized = normalize_and_validate(&raw, input_name)?;

    if normalized.len() > MAX_SECRET_BYTES {
        anyhow::bail!(
            "{} too long ({} bytes, maximum is {})",
            input_name,
            normalized.len(),
            MAX_SECRET_BYTES
        );
    }

    Ok(normalized)
}

pub fn show_progress<F, T>(
    unicode_support: bool,
    message: &'static str,
    f: F,
) -> Result<(T, Duration)>
where
    F: FnOnce() -> keysmith::Result<T>,
{
    let term = Term::stderr();
    term.hide_cursor().ok();

    let pb = ProgressBar::new_spinner();

    if unicode_support {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("-\\|/-"),
        );
    }

    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(80));

    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();

    pb.finish_and_clear();
    term.show_cursor().ok();

    Ok((result?, elapsed))
}

pub fn osc52_sequence(text: &str) -> Zeroizing<String> {
    Zeroizing::new(format!("\x1b]52;c;{}\x07", BASE64.encode(text.as_bytes())))
}

/// Hands the text to the terminal clipboard through an OSC 52 escape.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let term = Term::stderr();
    if !term.is_term() {
        anyhow::bail!("Clipboard copy needs an interactive terminal");
    }

    term.write_str(&osc52_sequence(text))
        .context("Failed to write clipboard escape sequence")?;
    term.flush()?;
    Ok(())
}

pub fn display_password(password: &str, info: &PasswordInfo, options: &DisplayOptions) {
    if options.quiet {
        println!("{}", password);
        return;
    }

    println!("Password:\n{}\n", password);

    let (check_ok, check_warn) = get_status_symbols(options.unicode_support);
    let (branch, last) = tree_glyphs(options.unicode_support);

    let strength = Strength::rate(info.entropy);
    let entropy_secure = strength != Strength::Weak;
    let entropy_style = status_style(entropy_secure, options);
    let entropy_status = if entropy_secure { check_ok } else { check_warn };

    let length_secure = info.length >= MIN_SAFE_PASSWORD_LENGTH;
    let length_style = status_style(length_secure, options);
    let length_status = if length_secure { check_ok } else { check_warn };

    println!("Stats:");
    println!(
        "  {} Entropy    {} {} bits ({})",
        branch,
        entropy_style.apply_to(format!("[{}]", entropy_status)),
        entropy_style.apply_to(format!("{:.1}", info.entropy)),
        entropy_style.apply_to(strength.label())
    );
    println!(
        "  {} Length     {} {} {}",
        branch,
        length_style.apply_to(format!("[{}]", length_status)),
        length_style.apply_to(info.length),
        plural(info.length, "char", "chars")
    );
    println!(
        "  {} Charset    {} chars{}",
        branch,
        info.charset_size,
        if info.exclude_ambiguous {
            " (ambiguous excluded)"
        } else {
            ""
        }
    );
    println!("  {} Sampling   Unbiased rejection, OS CSPRNG", last);
}

pub fn display_hash(
    hash: &CredentialHash,
    config: &HashConfig,
    elapsed: Duration,
    options: &DisplayOptions,
) {
    if options.quiet {
        println!("{}", hash);
        return;
    }

    let (check_ok, check_warn) = get_status_symbols(options.unicode_support);
    let (branch, last) = tree_glyphs(options.unicode_support);

    println!("\nHash ({}):\n{}\n", hash.scheme(), hash);
    println!("Settings:");

    match config.scheme {
        Scheme::Bcrypt => {
            let cost_secure = config.cost >= MIN_SAFE_BCRYPT_COST;
            let style = status_style(cost_secure, options);
            println!(
                "  {} Scheme     {} bcrypt (cost={}, 2^{} rounds)",
                branch,
                style.apply_to(format!("[{}]", if cost_secure { check_ok } else { check_warn })),
                style.apply_to(config.cost),
                config.cost
            );
        }
        Scheme::Argon2id => {
            println!(
                "  {} Scheme     [{}] Argon2id (m={} MiB, t={}, p={})",
                branch,
                check_ok,
                config.argon2.memory_mib(),
                config.argon2.iterations,
                config.argon2.parallelism
            );
        }
    }

    println!("  {} Salt       128-bit, fresh per hash", branch);
    println!("  {} Time       {:.2}s", last, elapsed.as_secs_f64());
}

pub fn display_verification(matches: bool, options: &DisplayOptions) {
    if options.quiet {
        println!("{}", if matches { "match" } else { "mismatch" });
        return;
    }

    let (check_ok, check_warn) = get_status_symbols(options.unicode_support);
    let style = status_style(matches, options);

    println!(
        "\n{} Verification: {}",
        style.apply_to(format!("[{}]", if matches { check_ok } else { check_warn })),
        style.apply_to(if matches {
            "password matches hash"
        } else {
            "password does not match hash"
        })
    );
}
