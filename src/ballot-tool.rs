//! A CLI tool for producing and checking SSI ballot signatures offline.
//! This uses the server's own encoder and verifier, so anything it accepts is
//! accepted by `POST /submit-signed-ballots` and vice versa.

use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

use clap::{Arg, ArgAction, ArgMatches, Command};
use data_encoding::{BASE64, BASE64URL_NOPAD};
use log::debug;
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use rand::rngs::OsRng;
use rocket::serde::json::serde_json;
use serde::{Deserialize, Serialize};

use ssi_ballot_backend::model::{
    ballot::{encode, encode_to_string, Ballot},
    key::{KeyError, PublicKeyDescriptor},
    signature::{decode_signature, verify},
};

const PROGRAM_NAME: &str = "ssi-ballot-tool";

const ABOUT_TEXT: &str = "Generate SSI voter keys, and sign or verify ballots offline.

EXIT CODES:
     0: Success (for `verify`: the signature is valid).
   255: Ran successfully, but the signature was rejected.
 Other: Error.";

const KEYGEN: &str = "keygen";
const SIGN: &str = "sign";
const VERIFY: &str = "verify";

const OUT_PATH: &str = "OUT_PATH";
const KEY_PATH: &str = "KEY_PATH";
const BALLOT_PATH: &str = "BALLOT_PATH";
const SIGNATURE: &str = "SIGNATURE";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    let path_arg = |name: &'static str, help: &'static str| {
        Arg::new(name)
            .help(help)
            .action(ArgAction::Set)
            .required(true)
    };

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new(KEYGEN)
                .about("Generate a P-256 keypair and print its public descriptor")
                .arg(path_arg(OUT_PATH, "Where to write the private JWK")),
        )
        .subcommand(
            Command::new(SIGN)
                .about("Print the base64 signature over a ballot's canonical encoding")
                .arg(path_arg(KEY_PATH, "The private JWK, as written by `keygen`"))
                .arg(path_arg(BALLOT_PATH, "The ballot, as a JSON object")),
        )
        .subcommand(
            Command::new(VERIFY)
                .about("Check a ballot signature")
                .arg(path_arg(KEY_PATH, "The voter's public JWK"))
                .arg(path_arg(BALLOT_PATH, "The ballot, as a JSON object"))
                .arg(path_arg(
                    SIGNATURE,
                    "The base64 signature, or a file containing it",
                )),
        )
}

/// Errors that this program may produce.
#[derive(Debug, PartialEq, Eq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode an input file.
    Format(String),
    /// The key in the input was unusable.
    Key(KeyError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IO(msg) => write!(f, "IO error: {msg}"),
            Self::Format(msg) => write!(f, "Format error: {msg}"),
            Self::Key(err) => write!(f, "Key error: {err}"),
        }
    }
}

impl From<KeyError> for Error {
    fn from(err: KeyError) -> Self {
        Self::Key(err)
    }
}

/// A private key in JWK form: the public descriptor plus the secret scalar.
#[derive(Debug, Serialize, Deserialize)]
struct PrivateJwk {
    #[serde(flatten)]
    public: PublicKeyDescriptor,
    d: String,
}

impl PrivateJwk {
    fn from_signing_key(key: &SigningKey) -> Self {
        Self {
            public: PublicKeyDescriptor::from_verifying_key(key.verifying_key()),
            d: BASE64URL_NOPAD.encode(&key.to_bytes()),
        }
    }

    /// Recover the signing key, checking that it matches the public part.
    fn signing_key(&self) -> Result<SigningKey, Error> {
        let d = BASE64URL_NOPAD
            .decode(self.d.trim_end_matches('=').as_bytes())
            .map_err(|e| Error::Format(format!("invalid `d`: {e}")))?;
        let key = SigningKey::from_slice(&d)
            .map_err(|_| Error::Format("`d` is not a valid P-256 scalar".to_string()))?;
        let public = self.public.import()?;
        if public.verifying_key() != key.verifying_key() {
            return Err(Error::Format(
                "`d` does not belong to the public coordinates".to_string(),
            ));
        }
        Ok(key)
    }
}

fn read_file(path: &str) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|e| Error::IO(format!("{path}: {e}")))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &str) -> Result<T, Error> {
    serde_json::from_str(&read_file(path)?).map_err(|e| Error::Format(format!("{path}: {e}")))
}

/// Fetch a required argument.
fn arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str, Error> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| Error::Format(format!("missing {name}")))
}

/// Write a fresh private key to `out` and return its public descriptor.
fn keygen(out: &str) -> Result<PublicKeyDescriptor, Error> {
    let key = SigningKey::random(&mut OsRng);
    let jwk = PrivateJwk::from_signing_key(&key);
    let json = serde_json::to_string_pretty(&jwk).map_err(|e| Error::Format(e.to_string()))?;
    fs::write(out, json).map_err(|e| Error::IO(format!("{out}: {e}")))?;
    Ok(jwk.public)
}

/// Sign the canonical encoding of the ballot, returning base64 DER.
fn sign(key_path: &str, ballot_path: &str) -> Result<String, Error> {
    let key = read_json::<PrivateJwk>(key_path)?.signing_key()?;
    let ballot: Ballot = read_json(ballot_path)?;
    debug!("Signing canonical ballot {}", encode_to_string(&ballot));
    let signature: Signature = key.sign(&encode(&ballot));
    Ok(BASE64.encode(signature.to_der().as_bytes()))
}

/// Check the signature; `Ok(false)` means it was rejected.
fn check(key_path: &str, ballot_path: &str, signature: &str) -> Result<bool, Error> {
    let key = read_json::<PublicKeyDescriptor>(key_path)?.import()?;
    let ballot: Ballot = read_json(ballot_path)?;
    debug!("Checking canonical ballot {}", encode_to_string(&ballot));
    let encoded = if Path::new(signature).is_file() {
        read_file(signature)?
    } else {
        signature.to_string()
    };
    Ok(decode_signature(&encoded)
        .map(|bytes| verify(&key, &ballot, &bytes))
        .unwrap_or(false))
}

/// Run the selected command and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let result = match args.subcommand() {
        Some((KEYGEN, sub)) => arg(sub, OUT_PATH).and_then(keygen).and_then(|public| {
            let json = serde_json::to_string_pretty(&public)
                .map_err(|e| Error::Format(e.to_string()))?;
            println!("{json}");
            Ok(0)
        }),
        Some((SIGN, sub)) => arg(sub, KEY_PATH)
            .and_then(|key| sign(key, arg(sub, BALLOT_PATH)?))
            .map(|signature| {
                println!("{signature}");
                0
            }),
        Some((VERIFY, sub)) => arg(sub, KEY_PATH)
            .and_then(|key| check(key, arg(sub, BALLOT_PATH)?, arg(sub, SIGNATURE)?))
            .map(|valid| {
                if valid {
                    println!("Signature valid");
                    0
                } else {
                    println!("Signature rejected");
                    255
                }
            }),
        _ => Err(Error::Format("unknown command".to_string())),
    };

    result.unwrap_or_else(|err| {
        eprintln!("{err}");
        1
    })
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
