//! Statistics output: a single human-readable
//! block on stdout, not through `tracing` — this is the program's actual
//! output, not a log line.

use crate::round::RoundReport;

pub fn print(report: &RoundReport) {
    println!("file:             {}", report.filename);
    println!("size:             {} bytes", report.file_size);
    println!("chunks:           {}", report.chunk_count);
    println!(
        "matched (union):  {} bytes ({:.2}% redundancy)",
        report.union_matched_bytes,
        report.redundancy_pct()
    );
    println!("elapsed:          {:.3}s", report.elapsed.as_secs_f64());
    println!();
    println!(
        "{:<8} {:>10} {:>14} {:>12} {:>10} {:>10} {:>8}",
        "node", "status", "matched_b", "redundancy", "matched", "uploaded", "failed"
    );
    for node in &report.nodes {
        let redundancy = if report.file_size == 0 {
            0.0
        } else {
            (node.matched_bytes as f64 / report.file_size as f64) * 100.0
        };
        println!(
            "{:<8} {:>10} {:>14} {:>11.2}% {:>10} {:>10} {:>8}",
            node.node_id,
            if node.failed { "down" } else { "ok" },
            node.matched_bytes,
            redundancy,
            node.matched_count,
            node.uploaded_count,
            node.failed_count,
        );
    }
}
