//! Interface de terminal do paysim — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`SubmissionProgress`] acompanha visualmente
//! o ciclo de vida de uma submissão no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state_machine::{Phase, SubmissionReceipt};

/// Indicador visual de progresso para uma submissão no terminal.
///
/// Exibe um spinner animado enquanto a submissão está pendente e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e retentativa (amarelo).
pub struct SubmissionProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para mensagens de retentativa.
    yellow: Style,
}

impl SubmissionProgress {
    /// Inicia o spinner com os dados da submissão e retorna a instância.
    pub fn start(email: &str, amount: f64) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("PENDING: {email} — {amount:.2}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a mensagem do spinner para refletir a fase atual.
    #[allow(dead_code)]
    pub fn update_phase(&self, phase: Phase) {
        self.pb.set_message(format!("{phase}"));
    }

    /// Exibe uma retentativa com o número da tentativa e o motivo.
    #[allow(dead_code)]
    pub fn retry(&self, attempt: u32, max: u32, reason: &str) {
        self.pb.println(format!(
            "  {} Retry {attempt}/{max}: {reason}",
            self.yellow.apply_to("↻")
        ));
    }

    /// Finaliza o spinner e exibe o desfecho da submissão.
    ///
    /// Sucesso em verde com checkmark; falha em vermelho com X e o motivo,
    /// lembrando o caminho de volta ao estado ocioso.
    pub fn complete(&self, phase: Phase, detail: Option<&str>) {
        self.pb.finish_and_clear();
        match phase {
            Phase::Success => {
                println!("  {} Payment confirmed", self.green.apply_to("✓"));
            }
            Phase::Error => {
                let reason = detail.unwrap_or("unknown failure");
                println!("  {} Submission failed: {reason}", self.red.apply_to("✗"));
                println!("    (a new submission may be started after reset)");
            }
            other => {
                println!("  {} Submission ended in {other}", self.yellow.apply_to("•"));
            }
        }
    }

    /// Imprime o recibo final formatado em JSON com estilo colorido.
    pub fn print_receipt(&self, receipt: &SubmissionReceipt) {
        println!();
        println!("{}", self.green.apply_to("─── Submission Receipt ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(receipt).unwrap_or_default()
        );
    }
}
