//! Plain-text rendering of the post-resolution vote breakdown.

use crate::gateway::NameResolver;
use crate::tally::TallyLine;
use gallows_types::MemberId;

/// Display label for the no-lynch pseudo-target.
pub const NO_LYNCH_LABEL: &str = "no lynch";

async fn label(names: &dyn NameResolver, member: &MemberId) -> String {
    if member.is_no_lynch() {
        NO_LYNCH_LABEL.to_string()
    } else {
        names.display_name(member).await
    }
}

/// Render the host-facing final breakdown: outcome headline plus one line
/// per target with its weighted total, threshold, and voters in cast order.
pub async fn render_host_report(
    names: &dyn NameResolver,
    lines: &[TallyLine],
    outcome: &MemberId,
) -> String {
    let mut out = if outcome.is_no_lynch() {
        "Voting has ended: no lynch.\n".to_string()
    } else {
        format!("Voting has ended: {} is lynched.\n", label(names, outcome).await)
    };

    for line in lines {
        let mut voters = Vec::with_capacity(line.voters.len());
        for voter in &line.voters {
            voters.push(label(names, voter).await);
        }
        let voters = if voters.is_empty() {
            "-".to_string()
        } else {
            voters.join(", ")
        };
        out.push_str(&format!(
            "{}: {}/{} ({})\n",
            label(names, &line.target).await,
            line.weighted_total,
            line.threshold,
            voters,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::PlainNames;

    fn m(id: &str) -> MemberId {
        MemberId::new(id)
    }

    #[tokio::test]
    async fn report_names_outcome_and_totals() {
        let lines = vec![
            TallyLine {
                target: m("alice"),
                voters: vec![m("bob"), m("carol"), m("dan")],
                weighted_total: 3,
                threshold: 3,
            },
            TallyLine {
                target: MemberId::no_lynch(),
                voters: vec![m("eve")],
                weighted_total: 1,
                threshold: 3,
            },
        ];

        let report = render_host_report(&PlainNames, &lines, &m("alice")).await;
        assert!(report.starts_with("Voting has ended: alice is lynched."));
        assert!(report.contains("alice: 3/3 (bob, carol, dan)"));
        assert!(report.contains("no lynch: 1/3 (eve)"));
    }

    #[tokio::test]
    async fn no_lynch_outcome_headline() {
        let lines = vec![TallyLine {
            target: MemberId::no_lynch(),
            voters: vec![],
            weighted_total: 0,
            threshold: 3,
        }];

        let report = render_host_report(&PlainNames, &lines, &MemberId::no_lynch()).await;
        assert!(report.starts_with("Voting has ended: no lynch."));
        assert!(report.contains("no lynch: 0/3 (-)"));
    }
}
