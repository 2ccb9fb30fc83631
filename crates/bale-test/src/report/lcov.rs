use std::fmt::Write;
use std::path::PathBuf;

use bale_config::Reporter;

use crate::Result;
use crate::coverage::CoverageMap;
use crate::report::{CoverageReporter, ReportContext, ReportFile, Rendered};

/// `lcov.info` tracefile.
pub struct LcovReporter;

impl CoverageReporter for LcovReporter {
    fn kind(&self) -> Reporter {
        Reporter::Lcov
    }

    fn render(&self, map: &CoverageMap, _ctx: &ReportContext) -> Result<Rendered> {
        let mut out = String::new();
        for (_, file) in map.iter() {
            // writing to a String cannot fail
            let _ = writeln!(out, "TN:");
            let _ = writeln!(out, "SF:{}", file.path.display());

            for function in file.functions.values() {
                let _ = writeln!(out, "FN:{},{}", function.line, function.name);
            }
            for function in file.functions.values() {
                let _ = writeln!(out, "FNDA:{},{}", function.hits, function.name);
            }
            let summary = file.summary();
            let _ = writeln!(out, "FNF:{}", summary.functions.total);
            let _ = writeln!(out, "FNH:{}", summary.functions.covered);

            for (block, branch) in file.branches.values().enumerate() {
                let _ = writeln!(out, "BRDA:{},{block},0,{}", branch.line, branch.hits);
            }
            let _ = writeln!(out, "BRF:{}", summary.branches.total);
            let _ = writeln!(out, "BRH:{}", summary.branches.covered);

            for (line, hits) in &file.lines {
                let _ = writeln!(out, "DA:{line},{hits}");
            }
            let _ = writeln!(out, "LF:{}", summary.lines.total);
            let _ = writeln!(out, "LH:{}", summary.lines.covered);
            out.push_str("end_of_record\n");
        }

        Ok(Rendered::Files(vec![ReportFile {
            path: PathBuf::from("lcov.info"),
            contents: out,
        }]))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::coverage::{BranchCoverage, FileCoverage, FunctionCoverage};

    #[test]
    fn records_follow_the_tracefile_layout() {
        let mut file = FileCoverage::new(PathBuf::from("/p/src/a.ts"));
        file.lines = [(1, 1), (2, 0)].into();
        file.functions.insert(
            0,
            FunctionCoverage {
                name: "main".into(),
                line: 1,
                hits: 1,
            },
        );
        file.branches.insert(5, BranchCoverage { line: 2, hits: 0 });
        let mut map = CoverageMap::default();
        map.add("src/a.ts".into(), file);

        let ctx = ReportContext::new(Path::new("/p"), PathBuf::from("/p/coverage"));
        let Rendered::Files(files) = LcovReporter.render(&map, &ctx).unwrap() else {
            panic!("lcov reporter writes a file");
        };
        assert_eq!(
            files[0].contents,
            "TN:\nSF:/p/src/a.ts\nFN:1,main\nFNDA:1,main\nFNF:1\nFNH:1\nBRDA:2,0,0,0\nBRF:1\nBRH:0\nDA:1,1\nDA:2,0\nLF:2\nLH:1\nend_of_record\n"
        );
    }
}
