//! PR comment commands against a real sync PR.

mod common;

use common::{forge, git, World};

use linecook::engine::{CommandOutcome, PrAction};
use linecook::forge::mock::{FailOn, MockForge, MockOperation};
use linecook::forge::ForgeError;

const SYNC_BRANCH: &str = "line-cook/fb_/update";

/// A synced world whose open sync PR (#1) carries `n` upstream commits,
/// each adding its own file.
async fn sync_pr(n: usize) -> (World, MockForge, Vec<String>) {
    let world = World::synced();
    let fb = world.upstream("fb");
    let shas = (0..n)
        .map(|i| {
            fb.commit(
                &[(
                    &format!("cookbooks/fb_apache/attributes/part{i}.rb"),
                    &format!("default['fb_apache']['part{i}'] = true\n"),
                )],
                &format!("fb_apache: part {i}"),
            )
        })
        .collect();
    let forge = forge();
    let summary = world.sync(&forge).await;
    assert_eq!(summary.report("fb").unwrap().pr, PrAction::Created(1));
    forge.clear_operations();
    (world, forge, shas)
}

fn short(sha: &str) -> &str {
    &sha[..7]
}

mod split {
    use super::*;

    #[tokio::test]
    async fn head_range_moves_the_rest() {
        let (world, forge, shas) = sync_pr(3).await;
        let body = format!("#linecook split {}-{}", short(&shas[0]), short(&shas[1]));

        let outcome = world.comment(&forge, 1, &body).await;

        let expected = "Split complete: this PR now has 2 commit(s); 1 commit(s) moved to #2.";
        assert_eq!(outcome, Some(CommandOutcome::Applied(expected.to_string())));
        assert_eq!(forge.comments_on(1), vec![expected.to_string()]);

        let kept = world.remote_messages(SYNC_BRANCH);
        assert_eq!(kept.len(), 2);
        assert!(kept[1].ends_with(&shas[1]));
        let moved_branch = format!("{SYNC_BRANCH}-split-1");
        let moved = world.remote_messages(&moved_branch);
        assert_eq!(moved.len(), 1);
        assert!(moved[0].ends_with(&shas[2]));

        let new_pr = forge.pr(2).unwrap();
        assert_eq!(new_pr.head, moved_branch);
        assert!(new_pr.title.ends_with("(split)"));
        assert!(new_pr.has_label("line-cook-pr-split"));
        assert!(new_pr.body.contains(&shas[2]));
        let original = forge.pr(1).unwrap();
        assert!(original.has_label("line-cook-pr-split"));
        assert!(original.body.contains(&shas[1]));
        assert!(!original.body.contains(&shas[2]));
    }

    #[tokio::test]
    async fn tail_range_moves_the_front() {
        let (world, forge, shas) = sync_pr(3).await;
        let body = format!("#linecook split {}-{}", short(&shas[1]), short(&shas[2]));

        let outcome = world.comment(&forge, 1, &body).await;

        assert!(matches!(outcome, Some(CommandOutcome::Applied(_))));
        let moved = world.remote_messages(&format!("{SYNC_BRANCH}-split-1"));
        assert_eq!(moved.len(), 1);
        assert!(moved[0].ends_with(&shas[0]));
    }

    #[tokio::test]
    async fn next_sync_leaves_split_commits_out() {
        let (world, forge, shas) = sync_pr(3).await;
        let body = format!("#linecook split {}-{}", short(&shas[0]), short(&shas[1]));
        world.comment(&forge, 1, &body).await;
        let tip = world.remote_tip(SYNC_BRANCH).unwrap();

        let summary = world.sync(&forge).await;

        assert_eq!(summary.report("fb").unwrap().pr, PrAction::Unchanged(1));
        assert_eq!(world.remote_tip(SYNC_BRANCH).unwrap(), tip);
    }

    #[tokio::test]
    async fn malformed_range_is_rejected_without_changes() {
        let (world, forge, _) = sync_pr(3).await;
        let tip = world.remote_tip(SYNC_BRANCH).unwrap();

        let outcome = world.comment(&forge, 1, "#linecook split c2-c4").await;

        match outcome {
            Some(CommandOutcome::Rejected(reason)) => {
                assert!(reason.contains("Invalid commit SHAs"), "{reason}")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(forge.mutations(), vec![MockOperation::Comment { number: 1 }]);
        assert!(forge.comments_on(1)[0].starts_with("Cannot run `split`"));
        assert_eq!(world.remote_tip(SYNC_BRANCH).unwrap(), tip);
        assert!(world.remote_tip(&format!("{SYNC_BRANCH}-split-1")).is_none());
    }

    #[tokio::test]
    async fn rejected_rewrite_removes_new_branch() {
        let (world, forge, shas) = sync_pr(3).await;
        world.refuse_rewrites();
        let tip = world.remote_tip(SYNC_BRANCH).unwrap();
        let body = format!("#linecook split {}-{}", short(&shas[0]), short(&shas[1]));

        let outcome = world.comment(&forge, 1, &body).await;

        match outcome {
            Some(CommandOutcome::Failed(error)) => {
                assert!(error.contains("changed during the split"), "{error}")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(world.remote_tip(SYNC_BRANCH).unwrap(), tip);
        assert!(world.remote_tip(&format!("{SYNC_BRANCH}-split-1")).is_none());
        assert!(forge.pr(2).is_none());
        assert_eq!(forge.mutations(), vec![MockOperation::Comment { number: 1 }]);
        assert!(forge.comments_on(1)[0].starts_with("Failed to execute command `split`"));
    }

    #[tokio::test]
    async fn failed_pr_creation_names_the_pushed_branch() {
        let (world, forge, shas) = sync_pr(3).await;
        forge.set_fail_on(FailOn::CreatePr(ForgeError::NetworkError("connection reset".into())));
        let body = format!("#linecook split {}-{}", short(&shas[0]), short(&shas[1]));

        let outcome = world.comment(&forge, 1, &body).await;

        let moved_branch = format!("{SYNC_BRANCH}-split-1");
        match outcome {
            Some(CommandOutcome::Failed(error)) => {
                assert!(error.contains(&format!("`{moved_branch}`")), "{error}");
                assert!(error.contains("connection reset"), "{error}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(world.remote_messages(&moved_branch).len(), 1);
        assert_eq!(world.remote_messages(SYNC_BRANCH).len(), 2);
        assert!(forge.comments_on(1)[0].contains(&moved_branch));
    }

    #[tokio::test]
    async fn dry_run_leaves_branches_and_forge_alone() {
        let (world, forge, shas) = sync_pr(3).await;
        let tip = world.remote_tip(SYNC_BRANCH).unwrap();
        let body = format!("#linecook split {}-{}", short(&shas[0]), short(&shas[1]));

        let outcome = world.comment_with(&forge, 1, &body, true).await;

        assert!(matches!(outcome, Some(CommandOutcome::Applied(_))));
        assert!(forge.mutations().is_empty(), "{:?}", forge.mutations());
        assert_eq!(world.remote_tip(SYNC_BRANCH).unwrap(), tip);
        assert!(world.remote_tip(&format!("{SYNC_BRANCH}-split-1")).is_none());
    }

    #[tokio::test]
    async fn interior_range_is_rejected() {
        let (world, forge, shas) = sync_pr(4).await;
        let body = format!("#linecook split {}-{}", short(&shas[1]), short(&shas[2]));

        let outcome = world.comment(&forge, 1, &body).await;

        match outcome {
            Some(CommandOutcome::Rejected(reason)) => {
                assert!(reason.contains("must be contiguous from one end"), "{reason}")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(world.remote_tip(&format!("{SYNC_BRANCH}-split-1")).is_none());
    }
}

mod rebase {
    use super::*;

    #[tokio::test]
    async fn rebases_onto_current_main() {
        let (world, forge, _) = sync_pr(2).await;
        let main = world.downstream_commit(&[("README.md", "# Our chef repo, v2\n")], "docs");

        let outcome = world.comment(&forge, 1, "#linecook rebase").await;

        let expected = "Rebased `line-cook/fb_/update` onto `main`: 2 commit(s).";
        assert_eq!(outcome, Some(CommandOutcome::Applied(expected.to_string())));
        let tip = world.remote_tip(SYNC_BRANCH).unwrap();
        git(&world.origin, &["merge-base", "--is-ancestor", &main, &tip]);
        assert_eq!(world.remote_messages(SYNC_BRANCH).len(), 2);
    }

    #[tokio::test]
    async fn rejected_push_is_a_failure() {
        let (world, forge, _) = sync_pr(2).await;
        world.downstream_commit(&[("README.md", "# Our chef repo, v2\n")], "docs");
        world.refuse_rewrites();
        let tip = world.remote_tip(SYNC_BRANCH).unwrap();

        let outcome = world.comment(&forge, 1, "#linecook rebase").await;

        match outcome {
            Some(CommandOutcome::Failed(error)) => {
                assert!(error.contains("moved during the rebase"), "{error}")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(world.remote_tip(SYNC_BRANCH).unwrap(), tip);
        assert!(forge.comments_on(1)[0].starts_with("Failed to execute command `rebase`"));
    }

    #[tokio::test]
    async fn conflict_leaves_branch_alone() {
        let (world, forge, _) = sync_pr(1).await;
        world.downstream_commit(
            &[("cookbooks/fb_apache/attributes/part0.rb", "# ours\n")],
            "conflicting local file",
        );
        let tip = world.remote_tip(SYNC_BRANCH).unwrap();

        let outcome = world.comment(&forge, 1, "#linecook rebase").await;

        assert!(matches!(outcome, Some(CommandOutcome::Failed(_))));
        let comment = &forge.comments_on(1)[0];
        assert!(comment.contains("Rebase failed with conflicts"), "{comment}");
        assert!(comment.contains("git push --force-with-lease"), "{comment}");
        assert_eq!(world.remote_tip(SYNC_BRANCH).unwrap(), tip);
    }
}

mod parsing {
    use super::*;

    #[tokio::test]
    async fn unknown_command_lists_supported_ones() {
        let (world, forge, _) = sync_pr(1).await;

        let outcome = world.comment(&forge, 1, "#linecook frobnicate now").await;

        assert!(matches!(outcome, Some(CommandOutcome::Rejected(_))));
        let comment = &forge.comments_on(1)[0];
        assert!(comment.starts_with("Unknown command: `frobnicate`"));
        assert!(comment.contains("- `#linecook rebase`"));
    }

    #[tokio::test]
    async fn plain_comment_is_ignored() {
        let (world, forge, _) = sync_pr(1).await;

        let outcome = world.comment(&forge, 1, "looks good to me").await;

        assert_eq!(outcome, None);
        assert!(forge.mutations().is_empty());
    }
}
