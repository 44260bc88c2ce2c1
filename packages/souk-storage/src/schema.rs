pub fn render_schema() -> String {
	let init = include_str!("../../../sql/init.sql");

	expand_includes(init)
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_categories.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_categories.sql")),
				"tables/002_products.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_products.sql")),
				"tables/003_orders.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_orders.sql")),
				"tables/004_order_items.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_order_items.sql")),
				"tables/005_cart_items.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_cart_items.sql")),
				"tables/006_product_interests.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_product_interests.sql")),
				"tables/007_liked_products.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_liked_products.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
