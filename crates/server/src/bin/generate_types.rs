//! Run with: cargo run --package server --bin generate-types --features typescript

use std::fs;
use std::path::Path;

fn main() {
    println!("Generating TypeScript types...");

    let out_dir = Path::new("frontend/src/types/generated");

    if let Err(e) = fs::create_dir_all(out_dir) {
        eprintln!("Failed to create output directory: {}", e);
        std::process::exit(1);
    }

    #[cfg(feature = "typescript")]
    {
        use ts_rs::TS;

        let results = [
            ("Debate", roundtable_core::Debate::export_all_to(out_dir)),
            ("DebateState", roundtable_core::DebateState::export_all_to(out_dir)),
            ("DebateSummary", roundtable_core::DebateSummary::export_all_to(out_dir)),
            (
                "CreateDebateRequest",
                roundtable_core::CreateDebateRequest::export_all_to(out_dir),
            ),
            ("Participant", roundtable_core::Participant::export_all_to(out_dir)),
            ("Turn", roundtable_core::Turn::export_all_to(out_dir)),
            ("Metrics", roundtable_core::Metrics::export_all_to(out_dir)),
            ("EventEnvelope", events::EventEnvelope::export_all_to(out_dir)),
            ("Event", events::Event::export_all_to(out_dir)),
            ("TurnEvent", orchestrator::TurnEvent::export_all_to(out_dir)),
            ("DebateExport", orchestrator::DebateExport::export_all_to(out_dir)),
            (
                "DebateResponse",
                server::routes::DebateResponse::export_all_to(out_dir),
            ),
        ];

        for (name, result) in results {
            if let Err(e) = result {
                eprintln!("Failed to export {}: {}", name, e);
                std::process::exit(1);
            }
        }

        println!("Types exported to {}", out_dir.display());

        generate_index(out_dir);
    }

    #[cfg(not(feature = "typescript"))]
    {
        eprintln!("Error: typescript feature is not enabled");
        eprintln!("Run with: cargo run --package server --bin generate-types --features typescript");
        std::process::exit(1);
    }
}

#[cfg(feature = "typescript")]
fn generate_index(out_dir: &Path) {
    let exports = r#"// Auto-generated - regenerate with: cargo run --package server --bin generate-types --features typescript

export * from './Debate';
export * from './DebateState';
export * from './DebateSummary';
export * from './CreateDebateRequest';
export * from './Participant';
export * from './Round';
export * from './Turn';
export * from './TurnStatus';
export * from './Metrics';
export * from './ParticipantMetrics';

export * from './EventEnvelope';
export * from './Event';

export * from './TurnEvent';
export * from './DebateExport';
export * from './DebateTranscript';
export * from './TranscriptRound';
export * from './TranscriptTurn';

export * from './DebateResponse';
"#;

    let index_path = out_dir.join("index.ts");
    if let Err(e) = fs::write(&index_path, exports) {
        eprintln!("Failed to write {}: {}", index_path.display(), e);
        std::process::exit(1);
    }

    println!("Generated {}", index_path.display());
}
