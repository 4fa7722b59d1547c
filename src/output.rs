use std::io::{self, Write};

use serde::Serialize;

use crate::pipeline::{Invocation, ProgressEvent, ProgressSink, RunSummary};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Banners,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_plan(plan: &[Invocation]) -> io::Result<()> {
        Self::print_json(plan)
    }

    pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Prints a section banner on stdout as each step starts.
pub struct BannerOutput;

impl BannerOutput {
    pub fn print_plan(plan: &[Invocation]) {
        for invocation in plan {
            println!("# {}", invocation.step.banner());
            println!("{}", invocation.command_line());
        }
    }
}

impl ProgressSink for BannerOutput {
    fn event(&self, event: ProgressEvent) {
        if let ProgressEvent::Started { banner, .. } = event {
            println!("\n ======= {banner} ======= \n");
        }
    }
}
