//! Macros for hand-authoring traces.

/// Build a [`StepSequence`](crate::StepSequence) from `description => payload`
/// pairs, numbering the steps in order.
///
/// # Example
///
/// ```ignore
/// use stepwise_core::{steps, trace::{array_of, Frame}};
///
/// let trace = steps![
///     "Start with the full array" => Frame::default().with_array(array_of([2, 7, 11, 15])),
///     "Check 2: complement 7 not seen" => Frame::default().with_highlight(4),
///     "Check 7: complement 2 found" => Frame::default().with_operation("return"),
/// ];
/// assert_eq!(trace.length(), 3);
/// ```
#[macro_export]
macro_rules! steps {
    () => {
        $crate::StepSequence::empty()
    };
    ($($description:expr => $payload:expr),+ $(,)?) => {
        $crate::StepSequence::from_payloads([$(($description, $payload)),+])
    };
}
