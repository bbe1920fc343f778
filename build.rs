// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

const DEFAULT_DATABASE_PATH: &str = "/var/lib/rpm-divert/diversions";

fn package_arg() -> Arg {
    Arg::new("package")
        .required(true)
        .help("Package owning the diversion")
}

fn build_cli() -> Command {
    Command::new("rpm-divert")
        .version(env!("CARGO_PKG_VERSION"))
        .author("rpm-divert Contributors")
        .about("Divert files owned by other packages")
        .subcommand_required(false)
        .arg(
            Arg::new("db_path")
                .short('d')
                .long("db-path")
                .value_name("PATH")
                .global(true)
                .default_value(DEFAULT_DATABASE_PATH)
                .help("Database path"),
        )
        .arg(
            Arg::new("log_level")
                .long("log-level")
                .value_name("LEVEL")
                .global(true)
                .default_value("info")
                .help("Log level used when RUST_LOG is not set"),
        )
        .subcommand(
            Command::new("add")
                .about("Add a diversion to a package")
                .arg(package_arg())
                .arg(Arg::new("source").required(true).help("File to divert"))
                .arg(
                    Arg::new("diversion")
                        .required(true)
                        .help("Where the original file is moved to"),
                )
                .arg(
                    Arg::new("action")
                        .short('a')
                        .long("action")
                        .value_parser(["nothing", "symlink", "copy"])
                        .default_value("nothing")
                        .help("What to put in place of the diverted file"),
                )
                .arg(
                    Arg::new("replacement")
                        .short('r')
                        .long("replacement")
                        .value_name("PATH")
                        .help("Replacement file (required by symlink and copy)"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove a diversion that is not applied")
                .arg(package_arg())
                .arg(Arg::new("source").required(true).help("Diverted file")),
        )
        .subcommand(
            Command::new("apply")
                .about("Apply a diversion")
                .arg(package_arg())
                .arg(
                    Arg::new("source")
                        .help("Diverted file (applies every diversion of the package if omitted)"),
                )
                .arg(
                    Arg::new("create_directory")
                        .short('c')
                        .long("create-directory")
                        .action(ArgAction::SetTrue)
                        .help("Create the directory of the diverted file if missing"),
                ),
        )
        .subcommand(
            Command::new("unapply")
                .about("Unapply a diversion, restoring the original file")
                .arg(package_arg())
                .arg(
                    Arg::new("source")
                        .help("Diverted file (unapplies every diversion of the package if omitted)"),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List diversions")
                .arg(Arg::new("package").help("Package name (lists every package if omitted)")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("rpm-divert.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
