// ビルド情報の埋め込み
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");
}
