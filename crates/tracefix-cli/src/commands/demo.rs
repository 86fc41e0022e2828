//! Demo command - diagnose a bundled pandas traceback.

use tracefix_ai::DiagnosisRequest;

use super::{diagnose, resolve_config};
use crate::Overrides;

/// A long traceback where only one frame belongs to the user.
const SAMPLE_LOG: &str = r#"Traceback (most recent call last):
  File "/usr/local/lib/python3.9/site-packages/pandas/core/indexes/base.py", line 3629, in get_loc
    return self._engine.get_loc(casted_key)
  File "pandas/_libs/index.pyx", line 136, in pandas._libs.index.IndexEngine.get_loc
  File "pandas/_libs/index.pyx", line 163, in pandas._libs.index.IndexEngine.get_loc
  File "pandas/_libs/hashtable_class_helper.pxi", line 5198, in pandas._libs.hashtable.PyObjectHashTable.get_item
  File "pandas/_libs/hashtable_class_helper.pxi", line 5206, in pandas._libs.hashtable.PyObjectHashTable.get_item
KeyError: 'weight'

The above exception was the direct cause of the following exception:

Traceback (most recent call last):
  File "/Users/student/homework/data_analysis.py", line 42, in calculate_avg
    result = df['score'] / df['weight']
  File "/usr/local/lib/python3.9/site-packages/pandas/core/frame.py", line 3807, in __getitem__
    indexer = self.columns.get_loc(key)
  File "/usr/local/lib/python3.9/site-packages/pandas/core/indexes/base.py", line 3631, in get_loc
    raise KeyError(key) from err
KeyError: 'weight'
"#;

const SAMPLE_CODE: &str = "def calculate_avg(df): return df['score'] / df['weight']";

pub(crate) async fn run(overrides: &Overrides) -> miette::Result<()> {
    println!("Sample code:");
    println!("  {}", SAMPLE_CODE);
    println!();

    let request = sample_request()?;
    let config = resolve_config(overrides);
    diagnose::diagnose(&config, &request, false).await
}

fn sample_request() -> miette::Result<DiagnosisRequest> {
    DiagnosisRequest::new(SAMPLE_CODE, SAMPLE_LOG).map_err(|e| miette::miette!("{}", e))
}
