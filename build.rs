// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Positional repository name
fn repository_arg() -> Arg {
    Arg::new("repository").required(true).help("Repository name")
}

/// Positional release (archive) name
fn release_arg() -> Arg {
    Arg::new("release").required(true).help("Release (archive) name")
}

fn build_cli() -> Command {
    Command::new("knxkit")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Fetch, cache and export KNX device releases")
        .arg(Arg::new("config").long("config").global(true).help("Configuration file"))
        .arg(Arg::new("storage").long("storage").global(true).help("Storage root"))
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("refresh")
                .about("Refresh the release catalog from the remote source")
                .arg(
                    Arg::new("prereleases")
                        .long("prereleases")
                        .action(ArgAction::SetTrue)
                        .help("Include prereleases in the listing"),
                ),
        )
        .subcommand(Command::new("repos").about("List repositories in the cached catalog"))
        .subcommand(
            Command::new("releases")
                .about("List the releases of a repository")
                .arg(repository_arg()),
        )
        .subcommand(
            Command::new("acquire")
                .about("Download, extract and register a release")
                .arg(repository_arg())
                .arg(release_arg()),
        )
        .subcommand(Command::new("local").about("List acquired releases and their products"))
        .subcommand(
            Command::new("remove")
                .about("Delete an acquired release")
                .arg(repository_arg())
                .arg(release_arg()),
        )
        .subcommand(
            Command::new("export")
                .about("Sign a product of an acquired release into a .knxprod file")
                .arg(repository_arg())
                .arg(release_arg())
                .arg(Arg::new("product").required(true).help("Product name"))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Output directory (default: <storage>/Temp)"),
                ),
        )
        .subcommand(
            Command::new("keygen")
                .about("Generate an Ed25519 key pair for signing exports")
                .arg(Arg::new("private_key").required(true).help("Private key output path"))
                .arg(Arg::new("public_key").required(true).help("Public key output path"))
                .arg(Arg::new("key_id").long("key-id").help("Key identifier"))
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Overwrite existing key files"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell", "elvish"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("knxkit.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
