//! Interface de linha de comando do paysim baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (submit, status, demo)
//! e flags globais (--endpoint, --seed, --max-retries, --verbose).

use clap::{Parser, Subcommand};

/// paysim — Simulador de submissão idempotente com retentativas.
#[derive(Debug, Parser)]
#[command(name = "paysim", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// URL base de um gateway remoto (substitui a simulação em processo).
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Semente do simulador de desfechos, para execuções determinísticas.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Número máximo de retentativas em caso de falha transitória.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submete um pagamento e acompanha o ciclo de vida até resolver.
    Submit {
        /// Email do remetente.
        email: String,

        /// Valor da submissão.
        amount: f64,
    },

    /// Consulta o status de uma submissão pelo request id.
    Status {
        /// Chave de idempotência retornada na submissão.
        request_id: String,
    },

    /// Executa a demonstração embutida dos três desfechos simulados.
    Demo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_submit_subcommand() {
        let cli = Cli::parse_from(["paysim", "submit", "ada@example.com", "100.50"]);
        match cli.command {
            Command::Submit { email, amount } => {
                assert_eq!(email, "ada@example.com");
                assert_eq!(amount, 100.50);
            }
            _ => panic!("expected Submit command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "paysim",
            "--seed",
            "42",
            "--max-retries",
            "5",
            "--verbose",
            "demo",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.seed, Some(42));
        assert_eq!(cli.max_retries, Some(5));
    }

    #[test]
    fn cli_parses_status_subcommand() {
        let cli = Cli::parse_from([
            "paysim",
            "--endpoint",
            "http://localhost:9090",
            "status",
            "ada@example.com-1700000000000-deadbeef",
        ]);
        assert_eq!(cli.endpoint.as_deref(), Some("http://localhost:9090"));
        match cli.command {
            Command::Status { request_id } => {
                assert_eq!(request_id, "ada@example.com-1700000000000-deadbeef");
            }
            _ => panic!("expected Status command"),
        }
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
