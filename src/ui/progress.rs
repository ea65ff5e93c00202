use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct ProgressManager {
    mp: MultiProgress,
    bars: Arc<Mutex<HashMap<String, ProgressBar>>>,
}

impl ProgressManager {
    pub fn new() -> Self {
        Self {
            mp: MultiProgress::new(),
            bars: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Manager whose bars are tracked but never drawn.
    pub fn hidden() -> Self {
        Self {
            mp: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            bars: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a new progress bar
    /// - `id`: unique bar id
    /// - `total`: length of the bar
    /// - `template`: indicatif template
    /// - `message`: initial message
    pub fn create_bar(
        &self,
        id: &str,
        total: u64,
        template: &str,
        message: &str,
    ) -> Result<(), String> {
        let mut bars = self
            .bars
            .lock()
            .map_err(|e| format!("Lock error: {}", e))?;

        if bars.contains_key(id) {
            return Err(format!("Progress bar '{}' already exists", id));
        }

        let style = ProgressStyle::default_bar()
            .template(template)
            .map_err(|e| format!("Bad template: {}", e))?
            .progress_chars("█▉▊▋▌▍▎▏ ");
        let pb = self.mp.add(ProgressBar::new(total));
        pb.set_style(style);
        pb.set_message(message.to_string());

        bars.insert(id.to_string(), pb);
        Ok(())
    }

    /// Advance a bar by `value`
    pub fn inc(&self, id: &str, value: u64) -> Result<(), String> {
        let bars = self
            .bars
            .lock()
            .map_err(|e| format!("Lock error: {}", e))?;
        if let Some(pb) = bars.get(id) {
            pb.inc(value);
            Ok(())
        } else {
            Err(format!("Progress bar '{}' not found", id))
        }
    }

    pub fn position(&self, id: &str) -> Result<u64, String> {
        let bars = self
            .bars
            .lock()
            .map_err(|e| format!("Lock error: {}", e))?;
        bars.get(id)
            .map(|pb| pb.position())
            .ok_or_else(|| format!("Progress bar '{}' not found", id))
    }

    /// Finish a bar, keeping it on screen
    pub fn finish(&self, id: &str, message: &str) -> Result<(), String> {
        let bars = self
            .bars
            .lock()
            .map_err(|e| format!("Lock error: {}", e))?;
        if let Some(pb) = bars.get(id) {
            pb.finish_with_message(message.to_string());
            Ok(())
        } else {
            Err(format!("Progress bar '{}' not found", id))
        }
    }

    /// Finish every bar
    pub fn finish_all(&self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, pb) in bars.drain() {
                if !pb.is_finished() {
                    pb.finish();
                }
            }
        }
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

pub mod templates {
    pub const STATION: &str =
        "\u{f048a} {msg:>10} [{bar:30.cyan}] {percent}% ({pos}/{len} packets)";
}
