use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const NUM_CLASSES: usize = 10;

/// The CIFAR-10 categories, in the order the model's outputs are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassLabel
{
    Airplane,
    Automobile,
    Bird,
    Cat,
    Deer,
    Dog,
    Frog,
    Horse,
    Ship,
    Truck,
}

impl ClassLabel
{
    pub const ALL: [ClassLabel; NUM_CLASSES] = [
        ClassLabel::Airplane,
        ClassLabel::Automobile,
        ClassLabel::Bird,
        ClassLabel::Cat,
        ClassLabel::Deer,
        ClassLabel::Dog,
        ClassLabel::Frog,
        ClassLabel::Horse,
        ClassLabel::Ship,
        ClassLabel::Truck,
    ];

    pub fn from_index(index: usize) -> Option<ClassLabel>
    {
        Self::ALL.get(index).copied()
    }

    pub fn name(&self) -> &'static str
    {
        match self
        {
            ClassLabel::Airplane => "Airplane",
            ClassLabel::Automobile => "Automobile",
            ClassLabel::Bird => "Bird",
            ClassLabel::Cat => "Cat",
            ClassLabel::Deer => "Deer",
            ClassLabel::Dog => "Dog",
            ClassLabel::Frog => "Frog",
            ClassLabel::Horse => "Horse",
            ClassLabel::Ship => "Ship",
            ClassLabel::Truck => "Truck",
        }
    }
}

impl Display for ClassLabel
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.name())
    }
}

/// Raw model output, one score per class. Not assumed to be a probability distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreVector(pub Vec<f32>);

impl ScoreVector
{
    pub fn as_slice(&self) -> &[f32]
    {
        &self.0
    }

    pub fn len(&self) -> usize
    {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for ScoreVector
{
    fn from(scores: Vec<f32>) -> Self
    {
        ScoreVector(scores)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction
{
    pub index: usize,
    pub label: ClassLabel,
    pub score: f32,
}

impl Prediction
{
    fn new(index: usize, score: f32) -> Option<Self>
    {
        ClassLabel::from_index(index).map(|label| Prediction { index, label, score })
    }
}

/// The two most likely classes for one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedResult
{
    pub top: Prediction,
    pub second: Prediction,
}

impl Display for RankedResult
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        write!(f, "Prediction:\t{}\nSecond Prediction:\t{}", self.top.label, self.second.label)
    }
}

fn validate(scores: &ScoreVector) -> Result<()>
{
    if scores.len() != NUM_CLASSES
    {
        return Err(Error::DimensionMismatch { expected: NUM_CLASSES, actual: scores.len() });
    }

    match scores.as_slice().iter().position(|score| score.is_nan())
    {
        Some(index) => Err(Error::InvalidScore { index }),
        None => Ok(()),
    }
}

/// Finds the best and second best classes in one left-to-right pass.
///
/// Both extrema start out unset (effectively negative infinity), so negative
/// scores rank like any others and the two predictions always name different
/// classes. Equal scores go to whichever index came first; an all-zero vector
/// therefore ranks Airplane then Automobile.
pub fn rank(scores: &ScoreVector) -> Result<RankedResult>
{
    validate(scores)?;

    let mut max: Option<(usize, f32)> = None;
    let mut second_max: Option<(usize, f32)> = None;

    for (i, &score) in scores.as_slice().iter().enumerate()
    {
        match max
        {
            Some((_, max_score)) if score <= max_score => {
                if second_max.map_or(true, |(_, second_score)| score > second_score)
                {
                    second_max = Some((i, score));
                }
            },
            _ => {
                second_max = max;
                max = Some((i, score));
            },
        }
    }

    let top = max.and_then(|(i, score)| Prediction::new(i, score));
    let second = second_max.and_then(|(i, score)| Prediction::new(i, score));
    match (top, second)
    {
        (Some(top), Some(second)) => Ok(RankedResult { top, second }),
        // Unreachable with NUM_CLASSES >= 2 validated scores.
        _ => Err(Error::DimensionMismatch { expected: NUM_CLASSES, actual: scores.len() }),
    }
}

/// Every class ordered by descending score, ties kept in index order, truncated to `k`.
pub fn top_k(scores: &ScoreVector, k: usize) -> Result<Vec<Prediction>>
{
    validate(scores)?;

    let mut predictions: Vec<Prediction> = scores.as_slice().iter()
        .enumerate()
        .filter_map(|(i, &score)| Prediction::new(i, score))
        .collect();

    // No NaNs after validation, so partial_cmp always succeeds.
    predictions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    predictions.truncate(k);

    Ok(predictions)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn scores(values: &[f32]) -> ScoreVector
    {
        ScoreVector(values.to_vec())
    }

    #[test]
    fn test_rank_softmax_output()
    {
        let result = rank(&scores(&[0.05, 0.9, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.03, 0.02])).unwrap();
        assert_eq!(result.top.label, ClassLabel::Automobile);
        assert_eq!(result.top.index, 1);
        assert_eq!(result.second.label, ClassLabel::Airplane);
        assert_eq!(result.second.index, 0);
    }

    #[test]
    fn test_second_found_after_top()
    {
        let result = rank(&scores(&[0.0, 0.0, 0.7, 0.0, 0.0, 0.0, 0.0, 0.1, 0.2, 0.0])).unwrap();
        assert_eq!(result.top.label, ClassLabel::Bird);
        assert_eq!(result.second.label, ClassLabel::Ship);
    }

    #[test]
    fn test_all_zero_scores()
    {
        let result = rank(&scores(&[0.0; NUM_CLASSES])).unwrap();
        assert_eq!(result.top.index, 0);
        assert_eq!(result.second.index, 1);
    }

    #[test]
    fn test_ties_go_to_earliest_index()
    {
        let result = rank(&scores(&[0.1, 0.4, 0.1, 0.4, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])).unwrap();
        assert_eq!(result.top.index, 1);
        assert_eq!(result.second.index, 3);

        let result = rank(&scores(&[0.0, 0.5, 0.2, 0.2, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])).unwrap();
        assert_eq!(result.top.index, 1);
        assert_eq!(result.second.index, 2);
    }

    #[test]
    fn test_negative_scores()
    {
        let result = rank(&scores(&[-5.0, -3.0, -9.0, -1.0, -7.0, -2.0, -8.0, -6.0, -4.0, -10.0])).unwrap();
        assert_eq!(result.top.label, ClassLabel::Cat);
        assert_eq!(result.second.label, ClassLabel::Dog);
    }

    #[test]
    fn test_single_positive_score()
    {
        let result = rank(&scores(&[-1.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0, 3.0])).unwrap();
        assert_eq!(result.top.label, ClassLabel::Truck);
        assert_eq!(result.second.label, ClassLabel::Airplane);
    }

    #[test]
    fn test_top_score_dominates_and_labels_differ()
    {
        let cases: [[f32; NUM_CLASSES]; 4] = [
            [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0],
            [1.0, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1],
            [0.3, 0.3, 0.3, 0.3, 0.3, 0.3, 0.3, 0.3, 0.3, 0.3],
            [2.0, -1.0, 7.5, 7.5, 0.0, 1e-9, 3.3, -4.0, 6.0, 7.4],
        ];

        for case in cases
        {
            let result = rank(&scores(&case)).unwrap();
            assert!(case.iter().all(|score| result.top.score >= *score), "{:?}", case);
            assert_ne!(result.top.index, result.second.index, "{:?}", case);
            let others_max = case.iter().enumerate()
                .filter(|(i, _)| *i != result.top.index)
                .map(|(_, s)| *s)
                .fold(f32::NEG_INFINITY, f32::max);
            assert_eq!(result.second.score, others_max, "{:?}", case);
        }
    }

    #[test]
    fn test_wrong_length_is_a_dimension_mismatch()
    {
        for len in [0, 1, 9, 11]
        {
            let result = rank(&scores(&vec![0.1; len]));
            match result
            {
                Err(Error::DimensionMismatch { expected, actual }) => {
                    assert_eq!(expected, NUM_CLASSES);
                    assert_eq!(actual, len);
                },
                other => panic!("expected DimensionMismatch for length {}, got {:?}", len, other),
            }
        }
    }

    #[test]
    fn test_nan_scores_are_rejected()
    {
        let mut values = [0.1; NUM_CLASSES];
        values[4] = f32::NAN;
        assert!(matches!(rank(&scores(&values)), Err(Error::InvalidScore { index: 4 })));
        assert!(matches!(top_k(&scores(&values), 3), Err(Error::InvalidScore { index: 4 })));
    }

    #[test]
    fn test_top_k_orders_by_score()
    {
        let values = [0.05, 0.6, 0.0, 0.1, 0.0, 0.0, 0.1, 0.0, 0.15, 0.0];
        let top = top_k(&scores(&values), 4).unwrap();
        let labels: Vec<ClassLabel> = top.iter().map(|p| p.label).collect();
        assert_eq!(labels, vec![ClassLabel::Automobile, ClassLabel::Ship, ClassLabel::Cat, ClassLabel::Frog]);

        assert_eq!(top_k(&scores(&values), 50).unwrap().len(), NUM_CLASSES);
        assert!(top_k(&scores(&values[..9]), 3).is_err());
    }

    #[test]
    fn test_display_matches_result_text()
    {
        let result = rank(&scores(&[0.05, 0.9, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.03, 0.02])).unwrap();
        assert_eq!(result.to_string(), "Prediction:\tAutomobile\nSecond Prediction:\tAirplane");
    }

    #[test]
    fn test_label_indices_are_stable()
    {
        for (i, label) in ClassLabel::ALL.iter().enumerate()
        {
            assert_eq!(ClassLabel::from_index(i), Some(*label));
        }
        assert_eq!(ClassLabel::from_index(NUM_CLASSES), None);
        assert_eq!(ClassLabel::Horse.to_string(), "Horse");
    }
}
