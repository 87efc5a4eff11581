use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use clap::{Parser, Subcommand};
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Local stand-in for the identity provider's signing side.
///
/// Generates an Ed25519 key, publishes it as a JWKS document and mints EdDSA
/// access tokens, so the gate can run with `AUTH_JWT_ALGORITHM=EdDSA` against
/// a static JWKS file server.
#[derive(Parser, Debug)]
#[command(name = "devtoken", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a fresh Ed25519 private key (PKCS#8 PEM)
    Keygen {
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Print the JWKS document for a private key
    Jwks {
        #[arg(long, value_name = "FILE")]
        private_pem: PathBuf,
        /// Default: RFC 7638 thumbprint of the public key
        #[arg(long)]
        kid: Option<String>,
    },
    /// Mint a signed access token
    Mint {
        #[arg(long, value_name = "FILE")]
        private_pem: PathBuf,
        /// Subject (the identity provider's user id)
        #[arg(long)]
        sub: String,
        /// Default: RFC 7638 thumbprint of the public key
        #[arg(long)]
        kid: Option<String>,
        #[arg(long, default_value = "authenticated")]
        aud: String,
        #[arg(long)]
        iss: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Lifetime in seconds; negative values mint an already expired token
        #[arg(long, default_value_t = 3600, allow_negative_numbers = true)]
        ttl: i64,
    },
}

fn b64url_json(value: &Value) -> CliResult<String> {
    Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(value)?))
}

fn now_unix() -> CliResult<i64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64)
}

fn load_key(path: &Path) -> CliResult<SigningKey> {
    let pem = fs::read_to_string(path)?;
    Ok(SigningKey::from_pkcs8_pem(&pem)?)
}

fn public_x(key: &SigningKey) -> String {
    URL_SAFE_NO_PAD.encode(key.verifying_key().as_bytes())
}

// RFC 7638: members {crv,kty,x} in lexicographic order, no whitespace.
fn thumbprint(x: &str) -> String {
    let canonical = format!("{{\"crv\":\"Ed25519\",\"kty\":\"OKP\",\"x\":\"{}\"}}", x);
    URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
}

fn keygen(out: &Path) -> CliResult<()> {
    let mut seed = [0u8; 32];
    getrandom::fill(&mut seed)?;
    let key = SigningKey::from_bytes(&seed);

    let pem = key.to_pkcs8_pem(LineEnding::LF)?;
    fs::write(out, pem.as_bytes())?;

    println!("wrote {}", out.display());
    println!("kid: {}", thumbprint(&public_x(&key)));
    Ok(())
}

fn jwks(private_pem: &Path, kid: Option<String>) -> CliResult<()> {
    let key = load_key(private_pem)?;
    let x = public_x(&key);
    let kid = kid.unwrap_or_else(|| thumbprint(&x));

    let doc = json!({
        "keys": [{
            "kty": "OKP",
            "crv": "Ed25519",
            "x": x,
            "kid": kid,
            "alg": "EdDSA",
            "use": "sig",
        }]
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

struct MintArgs {
    private_pem: PathBuf,
    sub: String,
    kid: Option<String>,
    aud: String,
    iss: Option<String>,
    email: Option<String>,
    ttl: i64,
}

fn mint(args: MintArgs) -> CliResult<()> {
    let key = load_key(&args.private_pem)?;
    let kid = args.kid.unwrap_or_else(|| thumbprint(&public_x(&key)));

    let header = json!({"alg": "EdDSA", "typ": "JWT", "kid": kid});

    let iat = now_unix()?;
    let mut claims = serde_json::Map::new();
    claims.insert("sub".to_string(), Value::String(args.sub));
    claims.insert("aud".to_string(), Value::String(args.aud));
    claims.insert("iat".to_string(), Value::Number(iat.into()));
    claims.insert("exp".to_string(), Value::Number((iat + args.ttl).into()));
    if let Some(iss) = args.iss {
        claims.insert("iss".to_string(), Value::String(iss));
    }
    if let Some(email) = args.email {
        claims.insert("email".to_string(), Value::String(email));
    }

    let signing_input = format!(
        "{}.{}",
        b64url_json(&header)?,
        b64url_json(&Value::Object(claims))?
    );
    let sig = key.sign(signing_input.as_bytes());

    println!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(sig.to_bytes()));
    Ok(())
}

fn main() -> CliResult<()> {
    match Args::parse().command {
        Command::Keygen { out } => keygen(&out),
        Command::Jwks { private_pem, kid } => jwks(&private_pem, kid),
        Command::Mint {
            private_pem,
            sub,
            kid,
            aud,
            iss,
            email,
            ttl,
        } => mint(MintArgs {
            private_pem,
            sub,
            kid,
            aud,
            iss,
            email,
            ttl,
        }),
    }
}
