//! CLI module - Command-line interface for Kartoteka
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Kartoteka - Insured Persons Administration
/// A small web service over a semicolon-delimited person table
#[derive(Parser)]
#[command(name = "kartoteka")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web service (the default when no command is given)
    #[command(alias = "-s", alias = "--serve")]
    Serve,

    /// Create a default config file and an empty record table
    #[command(alias = "--init")]
    Init,

    /// Create an administrator account in the record table
    ///
    /// Registration only ever creates regular users, so the first admin
    /// has to come from here.
    CreateAdmin {
        /// Login email, unique across the table
        #[arg(long)]
        email: String,

        /// Password, stored as an Argon2id hash
        #[arg(long)]
        password: String,

        /// First name
        #[arg(long)]
        name: String,

        /// Surname
        #[arg(long)]
        surname: String,

        /// Date of birth, YYYY-MM-DD
        #[arg(long)]
        dob: String,

        /// Phone number, e.g. +420777888999
        #[arg(long)]
        phone: String,
    },
}

pub use commands::*;
