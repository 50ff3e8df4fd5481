// ABOUTME: Classify command handler.
// ABOUTME: Prints the failure kind and recoverability of a stderr string.

use pullwarden::classify::{self, FailureKind};
use pullwarden::output::Output;
use serde::Serialize;

#[derive(Serialize)]
struct Classification {
    kind: FailureKind,
    recoverable: bool,
    permanent: bool,
}

pub fn classify(stderr: &str, output: &Output) {
    let result = Classification {
        kind: classify::classify(stderr),
        recoverable: classify::is_recoverable(stderr),
        permanent: classify::is_permanent(stderr),
    };
    let human = format!(
        "{} (recoverable: {}, permanent: {})",
        result.kind,
        if result.recoverable { "yes" } else { "no" },
        if result.permanent { "yes" } else { "no" },
    );
    output.result("classified", &human, &result);
}
