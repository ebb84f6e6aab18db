//! Dilithium3 Key Generation Tool for Capability Issuers
//!
//! Generates a keypair for a capability token issuer (spec §3). This tool
//! creates:
//! - Public key — distributed to nodes that must verify tokens this issuer mints
//! - Secret key — kept by whichever process runs the `CapabilityStore` (HSM recommended)
//!
//! Usage:
//!   cargo run --bin keygen -- --name "node-1" --output ./keys/

use clap::Parser;
use kernel_substrate::capability::{identity_of, CapabilitySigner, DilithiumSigner};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keygen", version, about = "Sovereign kernel capability issuer key generator")]
struct Args {
    /// Issuer name (for documentation and output filenames).
    #[arg(short, long)]
    name: String,

    /// Output directory for keys.
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

fn main() {
    let args = Args::parse();

    println!("Generating Dilithium3 capability issuer keypair for: {}", args.name);

    let signer = DilithiumSigner::generate();
    let public_key = signer.public_key();
    let identity = identity_of(public_key);

    fs::create_dir_all(&args.output).expect("failed to create output directory");

    let secret_path = args.output.join(format!("{}_secret.key", args.name));
    fs::write(&secret_path, signer.secret_key_bytes()).expect("failed to write secret key");
    println!("secret key saved to: {}", secret_path.display());
    println!("  size: {} bytes", signer.secret_key_bytes().len());

    let public_path = args.output.join(format!("{}_public.key", args.name));
    fs::write(&public_path, public_key).expect("failed to write public key");
    println!("public key saved to: {}", public_path.display());
    println!("  size: {} bytes", public_key.len());

    println!();
    println!("issuer identity (SHA3-256 of public key, used as `Token::issuer`):");
    println!("  {}", hex::encode(identity));

    let test_message = b"sovereign-kernel-substrate capability issuer self-test";
    let signature = signer.sign(test_message);
    if kernel_substrate::capability::verify_signature(public_key, test_message, &signature) {
        println!();
        println!("signature self-test: passed");
    } else {
        eprintln!();
        eprintln!("signature self-test: FAILED");
        std::process::exit(1);
    }

    println!();
    println!("store {}_secret.key securely; never commit it to version control.", args.name);
    println!("distribute {}_public.key to every node that must verify this issuer's tokens.", args.name);
}
