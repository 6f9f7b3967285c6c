#![allow(dead_code)]

pub use taskengine_test_utils::{builders, fakes, init_tracing, with_timeout};

use taskengine::task::TaskElement;

/// `main` (application root) with two children `a` and `b`; `b` has `b1`.
pub fn small_tree() -> TaskElement {
    TaskElement::new("main")
        .attr("main", "Y")
        .child(TaskElement::new("a"))
        .child(TaskElement::new("b").child(TaskElement::new("b1")))
}
