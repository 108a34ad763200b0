//! Cumulative stacking of process histograms

use crate::{error::PipelineError, histogram::Histogram};

/// Cumulative stack of process histograms
///
/// Layer k holds the sum of components 0 to k, plus the base histogram the
/// stack was started from (if any). The last layer is thus the top of the
/// stack, which is what the data gets compared to.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Stack {
    layers: Vec<Histogram>,
}
//
impl Stack {
    /// Stack up `components`, bottom first, optionally on top of `base`
    ///
    /// Each layer keeps the name of the component it was built from.
    ///
    pub fn build<'a>(
        components: impl IntoIterator<Item = &'a Histogram>,
        base: Option<&Histogram>,
    ) -> Result<Self, PipelineError> {
        let mut layers: Vec<Histogram> = Vec::new();
        for component in components {
            let mut layer = component.clone();
            if let Some(below) = layers.last().or(base) {
                layer.add(below)?;
            }
            layers.push(layer);
        }
        Ok(Self { layers })
    }

    /// Cumulative layers, bottom first
    pub fn layers(&self) -> &[Histogram] {
        &self.layers[..]
    }

    /// Top of the stack, i.e. the sum of all components (and base)
    pub fn top(&self) -> Option<&Histogram> {
        self.layers.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{histogram::tests::hist, numeric::Float};
    use proptest::prelude::*;

    #[test]
    fn layers_accumulate_bottom_up() {
        let a = hist("a", 1., &[1., 2.], &[0., 0.]);
        let b = hist("b", 1., &[10., 20.], &[0., 0.]);
        let c = hist("c", 1., &[100., 200.], &[0., 0.]);
        let stack = Stack::build([&a, &b, &c], None).unwrap();
        let contents = stack
            .layers()
            .iter()
            .map(|layer| layer.contents().as_slice().to_vec())
            .collect::<Vec<_>>();
        assert_eq!(contents, [vec![1., 2.], vec![11., 22.], vec![111., 222.]]);
        assert_eq!(stack.layers()[1].name(), "b");
    }

    #[test]
    fn stacking_on_a_base() {
        let base = hist("top", 1., &[5.], &[0.]);
        let s = hist("s", 1., &[1.], &[0.]);
        let stack = Stack::build([&s], Some(&base)).unwrap();
        assert_eq!(stack.top().unwrap().content(0), 6.);
        // The components themselves are left untouched
        assert_eq!(s.content(0), 1.);
    }

    #[test]
    fn empty_stack_has_no_top() {
        let stack = Stack::build(std::iter::empty::<&Histogram>(), None).unwrap();
        assert!(stack.top().is_none());
    }

    #[test]
    fn binning_mismatch_propagates() {
        let a = hist("a", 1., &[1., 2.], &[0., 0.]);
        let b = hist("b", 1., &[1.], &[0.]);
        assert!(Stack::build([&a, &b], None).is_err());
    }

    proptest! {
        #[test]
        fn top_is_the_sum_of_all_components(
            components in prop::collection::vec(
                prop::collection::vec((0 as Float)..(1e4 as Float), 5),
                1..8,
            )
        ) {
            let zeros = [0.; 5];
            let hists = components
                .iter()
                .enumerate()
                .map(|(i, content)| hist(&format!("p{}", i), 2., content, &zeros))
                .collect::<Vec<_>>();
            let stack = Stack::build(&hists, None).unwrap();
            let top = stack.top().unwrap();
            for bin in 0..5 {
                let expected: Float = components.iter().map(|c| c[bin]).sum();
                prop_assert!((top.content(bin) - expected).abs() <= 1e-3 * (1. + expected));
            }
        }
    }
}
