/*!

This is the long-form manual for `poll_shift` and `pollshift`.

## What it computes

Given a polling time series and the dates at which candidates withdrew from
the race, the pipeline derives for every withdrawal event:

- the polling difference of every remaining candidate between a snapshot
  taken before the withdrawal and one taken after it;
- the total gains and the total unrelated losses over that window;
- each candidate's share of the total gains;
- the "winners": the candidates that captured a disproportionate share of
  the departed candidate's support, according to a tiered threshold cascade
  (by default strictly above 0.5, else 0.375, else 0.3, else 0.25).

## Input formats

The command line program reads four CSV files, declared in the JSON
configuration.

### Polls

The full polling time series. The first column must be named `date`
(ISO `YYYY-MM-DD`); every other column is a candidate. Blank cells mark a
candidate not polled on that date.

```text
date,Trump,Rubio,Cruz,Undecided
2016-01-14,34,11,19,36
2016-01-15,35,,20,45
```

Rows whose non-blank cells do not sum to 100 are repaired by adding the
signed deficit to the `Undecided` column.

### Candidates

The registry of candidates with their withdrawal dates. `date` may be blank
for candidates still in the race.

```text
name,date,dropped
Bush,2016-02-20,true
Trump,,false
```

### Before / After snapshots

One row per withdrawn candidate, one column per candidate. A blank cell or
a zero means the candidate was not in the race at the snapshot time. Both
files must have the same rows and columns.

```text
name,Trump,Rubio,Cruz
Bush,34.5,11.2,19.8
```

## Configuration

The analysis is driven by a JSON file:

```json
{
    "outputSettings": {
        "contestName": "GOP primary 2016",
        "summaryFile": "summary.json",
        "chartsDirectory": "charts"
    },
    "dataFiles": {
        "polls": "polls.csv",
        "candidates": "candidates.csv",
        "before": "before.csv",
        "after": "after.csv"
    },
    "winnerTiers": [0.5, 0.375, 0.3, 0.25],
    "exclusions": [
        { "dropout": "Santorum", "excluded": "Paul" },
        { "dropout": "Christie", "excluded": "Fiorina" }
    ]
}
```

Relative paths are resolved against the directory of the configuration
file. `winnerTiers` is optional and defaults to the cascade above.
`exclusions` lists paired withdrawals: when analyzing the `dropout` event,
the `excluded` candidate's column is ignored (they left the race in the
same sequence and their zeroed column carries no information).

## Output

- A textual summary per event on standard output.
- A JSON summary (`--out`, or `summaryFile` in the configuration) with the
  per-event statistics.
- With a charts directory set, one polling-window line chart and one
  before/after/difference bar panel per event, in PNG format.
- `--reference <file>` compares the produced JSON summary against a
  reference file and fails on any difference.

 */
