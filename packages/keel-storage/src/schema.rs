pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_call_analyses.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_call_analyses.sql")),
				other => panic!("Unknown schema include: {other}"),
			}
		} else {
			out.push_str(line);
			out.push('\n');
		}
	}

	out
}
